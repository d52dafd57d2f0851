//! In-memory fake device for session and orchestrator tests.
//!
//! [`FakeConnector`] hands out [`FakeTransport`]s that interpret the
//! wire protocol against a shared per-device [`FakeDeviceState`], so a
//! device's stored content survives across sessions — which is what the
//! reuse-path tests need.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::protocol::{self, ArtRequest, ArtResponse, ErrorCode};
use super::transport::{ArtTransport, DeviceConnector};
use crate::core::{DeviceError, DeviceId};

/// Observable state of one fake device.
#[derive(Debug)]
pub(crate) struct FakeDeviceState {
    /// Version string reported in the handshake.
    pub api_version: String,
    /// Whether the handshake advertises artwork management.
    pub art_mode_supported: bool,
    /// Content handles currently held by the device.
    pub contents: HashSet<String>,
    /// Number of completed payload transfers.
    pub uploads: usize,
    /// Number of selection requests seen.
    pub selects: usize,
    /// The currently displayed content, if any.
    pub selected: Option<String>,
    /// Content handles that received styling, in order.
    pub styled: Vec<String>,
    /// Refuse selection requests with `busy`.
    pub reject_select: bool,
    /// Refuse styling requests with `style_unsupported`.
    pub reject_style: bool,
    next_content: u32,
}

impl Default for FakeDeviceState {
    fn default() -> Self {
        Self {
            api_version: "4.3.4.0".into(),
            art_mode_supported: true,
            contents: HashSet::new(),
            uploads: 0,
            selects: 0,
            selected: None,
            styled: Vec::new(),
            reject_select: false,
            reject_style: false,
            next_content: 1,
        }
    }
}

/// Transport wired straight to a [`FakeDeviceState`].
pub(crate) struct FakeTransport {
    state: Arc<Mutex<FakeDeviceState>>,
    pending: VecDeque<Vec<u8>>,
    awaiting_payload: bool,
}

impl FakeTransport {
    fn new(state: Arc<Mutex<FakeDeviceState>>) -> Self {
        Self {
            state,
            pending: VecDeque::new(),
            awaiting_payload: false,
        }
    }

    fn respond(&mut self, response: &ArtResponse) {
        let frame = protocol::encode_response(response).expect("fake response encodes");
        self.pending.push_back(frame);
    }
}

#[async_trait]
impl ArtTransport for FakeTransport {
    async fn send_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        if self.awaiting_payload {
            self.awaiting_payload = false;
            let content_id = {
                let mut state = self.state.lock().unwrap();
                state.uploads += 1;
                let id = format!("MY_F{:04}", state.next_content);
                state.next_content += 1;
                state.contents.insert(id.clone());
                id
            };
            self.respond(&ArtResponse::ImageAdded { content_id });
            return Ok(());
        }

        let request = protocol::decode_request(payload)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let mut start_payload = false;
        let response = {
            let mut state = self.state.lock().unwrap();
            match request {
                ArtRequest::GetApiVersion => Some(ArtResponse::ApiVersion {
                    version: state.api_version.clone(),
                    art_mode_supported: state.art_mode_supported,
                }),
                ArtRequest::GetContentInfo { content_id } => {
                    let exists = state.contents.contains(&content_id);
                    Some(ArtResponse::ContentInfo { content_id, exists })
                }
                ArtRequest::SendImage { .. } => {
                    start_payload = true;
                    Some(ArtResponse::ReadyToReceive)
                }
                ArtRequest::SelectImage { content_id, .. } => {
                    state.selects += 1;
                    if state.reject_select {
                        Some(ArtResponse::Error {
                            code: ErrorCode::Busy,
                            message: "device busy".into(),
                        })
                    } else if !state.contents.contains(&content_id) {
                        Some(ArtResponse::Error {
                            code: ErrorCode::ContentNotFound,
                            message: format!("no content {content_id}"),
                        })
                    } else {
                        state.selected = Some(content_id);
                        Some(ArtResponse::Ok)
                    }
                }
                ArtRequest::SetStyle { content_id, .. } => {
                    if state.reject_style {
                        Some(ArtResponse::Error {
                            code: ErrorCode::StyleUnsupported,
                            message: "matte not available".into(),
                        })
                    } else if !state.contents.contains(&content_id) {
                        Some(ArtResponse::Error {
                            code: ErrorCode::ContentNotFound,
                            message: format!("no content {content_id}"),
                        })
                    } else {
                        state.styled.push(content_id);
                        Some(ArtResponse::Ok)
                    }
                }
                ArtRequest::Refresh => Some(ArtResponse::Ok),
                ArtRequest::Close => None,
            }
        };
        if start_payload {
            self.awaiting_payload = true;
        }
        if let Some(response) = response {
            self.respond(&response);
        }
        Ok(())
    }

    async fn recv_frame(&mut self) -> io::Result<Vec<u8>> {
        self.pending.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "fake device has nothing to say")
        })
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Connector over a set of fake devices, keyed by device id.
#[derive(Default)]
pub(crate) struct FakeConnector {
    devices: Mutex<HashMap<String, Arc<Mutex<FakeDeviceState>>>>,
    unreachable: Mutex<HashSet<String>>,
    transient_failures: Mutex<HashMap<String, u32>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// State handle for a device, created on first use.
    pub fn device(&self, device: &DeviceId) -> Arc<Mutex<FakeDeviceState>> {
        Arc::clone(
            self.devices
                .lock()
                .unwrap()
                .entry(device.as_str().to_owned())
                .or_default(),
        )
    }

    /// Make every connect to this device fail.
    pub fn set_unreachable(&self, device: &DeviceId) {
        self.unreachable
            .lock()
            .unwrap()
            .insert(device.as_str().to_owned());
    }

    /// Make the next `count` connects to this device fail, then recover.
    pub fn fail_next_connects(&self, device: &DeviceId, count: u32) {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(device.as_str().to_owned(), count);
    }
}

#[async_trait]
impl DeviceConnector for FakeConnector {
    type Transport = FakeTransport;

    async fn connect(&self, device: &DeviceId) -> Result<FakeTransport, DeviceError> {
        if self.unreachable.lock().unwrap().contains(device.as_str()) {
            return Err(DeviceError::Unreachable(format!("{device}: no route")));
        }
        {
            let mut failures = self.transient_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(device.as_str()) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DeviceError::Unreachable(format!(
                        "{device}: transient connect failure"
                    )));
                }
            }
        }
        Ok(FakeTransport::new(self.device(device)))
    }
}
