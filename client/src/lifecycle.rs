/// Client lifecycle state machine.
///
/// The whole client state is one owned [`Session`] value. [`step`] consumes
/// it together with an [`Event`] and returns the next session plus the
/// [`Effect`]s the driver has to run. Nothing in here performs I/O.
///
/// ```text
/// idle -> fetching -> ready -> downloading -> complete
///            \                     \
///             -> error <------------
/// ```
///
/// Every resolution and transfer is issued under a fresh ticket. Results
/// carrying an older ticket are dropped, so a clear while a request is in
/// flight cannot resurrect stale data.
use std::path::PathBuf;

use clipdrop_shared::locator;
use clipdrop_shared::models::{DownloadFormat, MediaItemInfo, TransferRequest};

/// Synthetic progress never passes this value before completion is confirmed.
pub const PROGRESS_CAP: f64 = 90.0;

pub type Ticket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Fetching,
    Ready,
    Downloading,
    Complete,
    Error,
}

impl Status {
    /// Whether a submit is actionable in this state.
    pub fn accepts_submit(&self) -> bool {
        !matches!(self, Status::Fetching | Status::Downloading)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub status: Status,
    pub input: String,
    pub info: Option<MediaItemInfo>,
    pub format: DownloadFormat,
    pub quality: Option<String>,
    /// Presentational estimate only; not derived from transferred bytes.
    pub progress: f64,
    pub error: Option<String>,
    pub saved_to: Option<PathBuf>,
    ticket: Ticket,
    ticking: bool,
    accepted: bool,
    /// Format the running transfer was requested in.
    transfer_format: DownloadFormat,
    /// Ticket of a transfer that has not reported finished or failed yet.
    in_flight: Option<Ticket>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            status: Status::Idle,
            input: String::new(),
            info: None,
            format: DownloadFormat::Video,
            quality: None,
            progress: 0.0,
            error: None,
            saved_to: None,
            ticket: 0,
            ticking: false,
            accepted: false,
            transfer_format: DownloadFormat::Video,
            in_flight: None,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Whether an earlier transfer is still running, even if no longer shown.
    pub fn transfer_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    fn settle_transfer(&mut self, ticket: Ticket) {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }
    }

    fn next_ticket(&mut self) -> Ticket {
        self.ticket += 1;
        self.ticket
    }

    fn fail(&mut self, message: String) {
        self.status = Status::Error;
        self.error = Some(message);
    }

    fn reset_to_idle(&mut self) {
        self.status = Status::Idle;
        self.info = None;
        self.quality = None;
        self.error = None;
        self.saved_to = None;
    }

    /// Emit `StopProgress` only if the ticker is running.
    fn stop_ticker(&mut self, effects: &mut Vec<Effect>) {
        if self.ticking {
            self.ticking = false;
            effects.push(Effect::StopProgress);
        }
    }

    fn is_current(&self, status: Status, ticket: Ticket) -> bool {
        self.status == status && self.ticket == ticket
    }
}

/// Inputs to the state machine: user actions and completed operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Input(String),
    Clear,
    Submit,
    SetFormat(DownloadFormat),
    /// Variant id or label of a quality option; `None` for automatic.
    SelectQuality(Option<String>),
    Resolved {
        ticket: Ticket,
        result: Result<MediaItemInfo, String>,
    },
    ProgressTick {
        ticket: Ticket,
        increment: f64,
    },
    /// The server answered the download with a success status.
    TransferAccepted {
        ticket: Ticket,
    },
    TransferFinished {
        ticket: Ticket,
        saved_to: PathBuf,
    },
    TransferFailed {
        ticket: Ticket,
        message: String,
    },
}

/// Work requested from the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Resolve {
        ticket: Ticket,
        url: String,
        collection_id: Option<String>,
    },
    BeginTransfer {
        ticket: Ticket,
        url: String,
        title: String,
        request: TransferRequest,
    },
    StartProgress {
        ticket: Ticket,
    },
    StopProgress,
    RecordHistory {
        info: MediaItemInfo,
        format: DownloadFormat,
    },
}

/// Advance the session by one event.
pub fn step(mut session: Session, event: Event) -> (Session, Vec<Effect>) {
    let mut effects = Vec::new();

    match event {
        Event::Input(text) => {
            session.input = text.trim().to_string();
            if matches!(session.status, Status::Ready | Status::Complete | Status::Error) {
                let item_id = locator::classify(&session.input)
                    .ok()
                    .and_then(|l| l.item_id);
                let same_item = session
                    .info
                    .as_ref()
                    .map_or(false, |info| Some(&info.item_id) == item_id.as_ref());
                if session.status == Status::Error || !same_item {
                    session.reset_to_idle();
                }
            }
        }

        Event::Clear => {
            session.stop_ticker(&mut effects);
            session.next_ticket();
            session.reset_to_idle();
            session.input.clear();
            session.progress = 0.0;
        }

        Event::SetFormat(format) => session.format = format,

        Event::SelectQuality(choice) => match choice {
            None => session.quality = None,
            Some(choice) => {
                let found = session.info.as_ref().and_then(|info| {
                    info.quality_options
                        .iter()
                        .find(|q| q.variant_id == choice || q.label == choice)
                });
                if let Some(option) = found {
                    session.quality = Some(option.variant_id.clone());
                }
            }
        },

        Event::Submit => match session.status {
            Status::Idle | Status::Error => submit_fetch(&mut session, &mut effects),
            Status::Ready | Status::Complete if session.in_flight.is_none() => {
                submit_download(&mut session, &mut effects)
            }
            Status::Ready | Status::Complete => {}
            Status::Fetching | Status::Downloading => {}
        },

        Event::Resolved { ticket, result } => {
            if session.is_current(Status::Fetching, ticket) {
                match result {
                    Ok(info) => {
                        session.status = Status::Ready;
                        session.info = Some(info);
                        session.quality = None;
                        session.error = None;
                    }
                    Err(message) => {
                        session.info = None;
                        session.fail(message);
                    }
                }
            }
        }

        Event::ProgressTick { ticket, increment } => {
            if session.is_current(Status::Downloading, ticket) && session.ticking {
                session.progress = (session.progress + increment.max(0.0)).min(PROGRESS_CAP);
                if session.progress >= PROGRESS_CAP {
                    session.stop_ticker(&mut effects);
                }
            }
        }

        Event::TransferAccepted { ticket } => {
            if session.is_current(Status::Downloading, ticket) && !session.accepted {
                session.accepted = true;
                if let Some(info) = &session.info {
                    effects.push(Effect::RecordHistory {
                        info: info.clone(),
                        format: session.transfer_format,
                    });
                }
                session.stop_ticker(&mut effects);
                session.progress = 100.0;
            }
        }

        Event::TransferFinished { ticket, saved_to } => {
            session.settle_transfer(ticket);
            if session.is_current(Status::Downloading, ticket) {
                session.stop_ticker(&mut effects);
                session.progress = 100.0;
                session.status = Status::Complete;
                session.saved_to = Some(saved_to);
            }
        }

        Event::TransferFailed { ticket, message } => {
            session.settle_transfer(ticket);
            if session.is_current(Status::Downloading, ticket) {
                session.stop_ticker(&mut effects);
                session.fail(message);
            }
        }
    }

    (session, effects)
}

fn submit_fetch(session: &mut Session, effects: &mut Vec<Effect>) {
    if session.input.is_empty() {
        return;
    }

    let located = locator::classify(&session.input).and_then(|l| {
        l.require_item()?;
        Ok(l)
    });
    match located {
        Ok(locator) => {
            let ticket = session.next_ticket();
            session.status = Status::Fetching;
            session.error = None;
            effects.push(Effect::Resolve {
                ticket,
                url: locator.resolution_url(),
                collection_id: locator.collection_id,
            });
        }
        Err(e) => session.fail(e.to_string()),
    }
}

fn submit_download(session: &mut Session, effects: &mut Vec<Effect>) {
    let Some(info) = session.info.as_ref() else {
        session.reset_to_idle();
        return;
    };

    let request = TransferRequest {
        item_id: info.item_id.clone(),
        explicit_variant_id: session.quality.clone(),
        audio_only: session.format == DownloadFormat::Audio,
    };
    let url = locator::canonical_url(&info.item_id);
    let title = info.title.clone();

    let ticket = session.next_ticket();
    session.status = Status::Downloading;
    session.progress = 0.0;
    session.error = None;
    session.saved_to = None;
    session.accepted = false;
    session.ticking = true;
    session.transfer_format = session.format;
    session.in_flight = Some(ticket);
    effects.push(Effect::StartProgress { ticket });
    effects.push(Effect::BeginTransfer {
        ticket,
        url,
        title,
        request,
    });
}
