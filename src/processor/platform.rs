//! `ProcessPlatform`: structural stub, §4.5.3. The interface closes the
//! processor loop; no platform semantics are implemented here.

use crate::address::{Endpoint, Status};

use super::Frame;

pub fn process(frame: Frame) -> Frame {
    Frame {
        destination: Endpoint::Utim,
        status: Status::Finalized,
        body: Vec::new(),
        ..frame
    }
}
