pub mod cloudhsm;
