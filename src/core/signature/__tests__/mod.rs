mod signature_test;
