pub mod dispatch_worker;
