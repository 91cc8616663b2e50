pub mod support;

mod rpc_tests;
