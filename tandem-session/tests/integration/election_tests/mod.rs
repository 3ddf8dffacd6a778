mod test_initiator_election;
