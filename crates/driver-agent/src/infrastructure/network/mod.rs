//! Network infrastructure: the HTTP command server, the UDP frame stream and
//! the port allocation both of them start from.

pub mod command_server;
pub mod port_allocator;
pub mod stream_server;
