//! Protocol module containing the command route table, response shape,
//! script language and frame datagram format.

pub mod datagram;
pub mod response;
pub mod route;
pub mod script;

pub use datagram::{split_frame, DatagramError, DatagramHeader, FrameReassembler};
pub use response::{CommandError, CommandResponse, STATUS_OK};
pub use route::{RawRouteAction, RouteAction, RouteName};
pub use script::{parse_script, ScriptError, ScriptInstruction};
