// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! Transport module.
//!
//! Rendezvous setup over Unix domain sockets and the framed duplex
//! channel the invocation layer runs on.

mod channel;
mod framing;

pub use channel::{connect, socket_path_for, FrameReader, FrameWriter, FramedChannel, RendezvousPoint};
pub use framing::{encode_frame, FrameHeader, FRAME_HEADER_LEN};
