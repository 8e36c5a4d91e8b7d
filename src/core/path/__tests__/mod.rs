mod interval_test;
