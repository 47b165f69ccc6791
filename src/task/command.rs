//! Remote commands
//!
//! Transport-independent form of the desk's remote control surface. A network
//! front end parses a request into a [`DeskCommand`], hands it to
//! [`CommandService::request`] and marshals the [`DeskResponse`] back.
//!
//! | Request          | Command         | Response            |
//! |------------------|-----------------|---------------------|
//! | `GET /position`  | `Position`      | `Position(cm)`      |
//! | `GET /distance`  | `Distance`      | `Distance(cm)`      |
//! | `GET /status`    | `Status`        | `Status{is_primed}` |
//! | `POST /move/{d}` | `Move(d)`       | `Moving(d)`         |
//! | `POST /go/{cm}`  | `Go(cm)`        | `Position(cm)`      |
//! | `POST /prime`    | `Prime`         | `Position(cm)`      |
//! | `POST /stop`     | `Stop`          | `Position(cm)`      |
//!
//! The service runs a fixed number of lanes side by side, so a `Stop` is
//! served while a `Go` on another lane is still moving the desk.

use embassy_futures::join::join4;
use embassy_futures::select::{select4, Either4};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_sync::signal::Signal;
use embedded_hal::digital::OutputPin;

use crate::control::DeskController;
use crate::driver::range_sensor::Ranging;
use crate::error::{Error, Result};
use crate::system::direction::Direction;

/// Requests served concurrently
pub const LANES: usize = 4;

/// A remote command
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeskCommand {
    Position,
    Distance,
    Status,
    Move(Direction),
    Go(f32),
    Prime,
    Stop,
}

impl DeskCommand {
    /// Parses a method and request path
    ///
    /// # Errors
    ///
    /// - `Error::InvalidDirection` for a `/move` with anything but `up` or `down`
    /// - `Error::InvalidTarget` for a `/go` whose target is not a number
    /// - `Error::UnknownCommand` for any other route
    pub fn parse(method: &str, path: &str) -> Result<Self> {
        let mut segments = path.trim_matches('/').split('/');
        let head = segments.next().unwrap_or("");
        let arg = segments.next();
        if segments.next().is_some() {
            return Err(Error::UnknownCommand);
        }

        match (method, head, arg) {
            ("GET", "position", None) => Ok(DeskCommand::Position),
            ("GET", "distance", None) => Ok(DeskCommand::Distance),
            ("GET", "status", None) => Ok(DeskCommand::Status),
            ("POST", "move", Some(direction)) => Ok(DeskCommand::Move(direction.parse()?)),
            ("POST", "go", Some(target)) => target
                .parse::<f32>()
                .map(DeskCommand::Go)
                .map_err(|_| Error::InvalidTarget),
            ("POST", "prime", None) => Ok(DeskCommand::Prime),
            ("POST", "stop", None) => Ok(DeskCommand::Stop),
            _ => Err(Error::UnknownCommand),
        }
    }
}

/// Reply to a [`DeskCommand`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeskResponse {
    Position(f32),
    Distance(f32),
    Status { is_primed: bool },
    Moving(Direction),
}

/// Executes one command against the desk
pub async fn handle<R: Ranging, P: OutputPin>(desk: &DeskController<R, P>, command: DeskCommand) -> Result<DeskResponse> {
    debug!("command {:?}", command);
    match command {
        DeskCommand::Position => Ok(DeskResponse::Position(desk.position().await.cm())),
        DeskCommand::Distance => Ok(DeskResponse::Distance(desk.position().await.cm())),
        DeskCommand::Status => Ok(DeskResponse::Status {
            is_primed: desk.is_primed(),
        }),
        DeskCommand::Move(direction) => {
            desk.manual_move(direction).await?;
            Ok(DeskResponse::Moving(direction))
        }
        DeskCommand::Go(target) => desk.go_to(target).await.map(DeskResponse::Position),
        DeskCommand::Prime => desk.prime().await.map(DeskResponse::Position),
        DeskCommand::Stop => {
            desk.stop().await;
            Ok(DeskResponse::Position(desk.position().await.cm()))
        }
    }
}

type Lock = CriticalSectionRawMutex;

/// Request queue between a transport and the desk
pub struct CommandService {
    requests: Channel<Lock, (usize, DeskCommand), LANES>,
    responses: [Signal<Lock, Result<DeskResponse>>; LANES],
    lanes: [Mutex<Lock, ()>; LANES],
}

impl Default for CommandService {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandService {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            responses: [Signal::new(), Signal::new(), Signal::new(), Signal::new()],
            lanes: [Mutex::new(()), Mutex::new(()), Mutex::new(()), Mutex::new(())],
        }
    }

    /// Submits a command and waits for its response
    pub async fn request(&self, command: DeskCommand) -> Result<DeskResponse> {
        let (lane, _guard) = self.claim_lane().await;
        self.responses[lane].reset();
        self.requests.send((lane, command)).await;
        self.responses[lane].wait().await
    }

    async fn claim_lane(&self) -> (usize, MutexGuard<'_, Lock, ()>) {
        for (lane, mutex) in self.lanes.iter().enumerate() {
            if let Ok(guard) = mutex.try_lock() {
                return (lane, guard);
            }
        }
        let [a, b, c, d] = &self.lanes;
        match select4(a.lock(), b.lock(), c.lock(), d.lock()).await {
            Either4::First(guard) => (0, guard),
            Either4::Second(guard) => (1, guard),
            Either4::Third(guard) => (2, guard),
            Either4::Fourth(guard) => (3, guard),
        }
    }

    /// Serves requests forever
    pub async fn run<R: Ranging, P: OutputPin>(&self, desk: &DeskController<R, P>) -> ! {
        info!("command service ready, {} lanes", LANES);
        let (never, ..) = join4(self.serve(desk), self.serve(desk), self.serve(desk), self.serve(desk)).await;
        never
    }

    async fn serve<R: Ranging, P: OutputPin>(&self, desk: &DeskController<R, P>) -> ! {
        loop {
            let (lane, command) = self.requests.receive().await;
            let response = handle(desk, command).await;
            if let Err(e) = &response {
                if e.is_client_error() {
                    debug!("rejected {:?}: {}", command, e);
                } else {
                    warn!("{:?} failed: {}", command, e);
                }
            }
            self.responses[lane].signal(response);
        }
    }
}
