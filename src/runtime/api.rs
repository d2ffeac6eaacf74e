//! Request/response surface for transports.
//!
//! Front ends send one [`Request`] per operation; [`Engine::handle`] checks
//! the caller's rights from the [`RequestContext`] and answers with a
//! [`Response`] or an [`EngineError`].

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::core::{
    Availability, ContactUpdate, Engine, EngineError, EngineResult, ErrorClass, ExitReceipt,
    ParkingReport, ReportKind, ReportPeriod, RequestContext, Role, Session, SlotAvailability,
    Subscriber, SubscriberProfile, SystemStatus,
};
use crate::util::{ParkingCode, SpotId, SubscriberId};

const STAFF: [Role; 2] = [Role::Attendant, Role::Manager];

/// One operation requested by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Book a slot.
    Reserve {
        /// Booking subscriber.
        subscriber_id: SubscriberId,
        /// Requested start, `YYYY-MM-DD HH:MM`.
        start: String,
    },
    /// Withdraw a reservation.
    Cancel {
        /// Owning subscriber.
        subscriber_id: SubscriberId,
        /// Reservation code.
        parking_code: String,
    },
    /// Walk-in arrival.
    Enter {
        /// Arriving subscriber.
        subscriber_id: SubscriberId,
    },
    /// Arrival with a booking.
    Activate {
        /// Reservation code.
        parking_code: String,
    },
    /// Leave the facility.
    Exit {
        /// Session code.
        parking_code: String,
    },
    /// Extend an active session.
    Extend {
        /// Session code.
        parking_code: String,
        /// Whole hours to add.
        hours: u32,
    },
    /// Look up a forgotten parking code.
    RecoverCode {
        /// Subscriber who lost the code.
        subscriber_id: SubscriberId,
    },
    /// Current spot availability.
    Availability,
    /// A subscriber's sessions.
    History {
        /// Subscriber.
        subscriber_id: SubscriberId,
    },
    /// Manager report. Defaults to the current month.
    Report {
        /// Report kind.
        kind: ReportKind,
        /// Covered period.
        #[serde(default)]
        period: Option<ReportPeriod>,
    },
    /// Bookable slots for a day.
    TimeSlots {
        /// Day to list.
        date: NaiveDate,
    },
    /// Create a subscriber account.
    RegisterSubscriber {
        /// Contact details and role.
        profile: SubscriberProfile,
    },
    /// Change contact details.
    UpdateSubscriber {
        /// Subscriber.
        subscriber_id: SubscriberId,
        /// Fields to change.
        update: ContactUpdate,
    },
    /// Fetch one subscriber.
    GetSubscriber {
        /// Subscriber.
        subscriber_id: SubscriberId,
    },
    /// Every subscriber.
    ListSubscribers,
    /// Subscribers with a given name, for the attendant desk.
    FindSubscribers {
        /// Name to match, ignoring case.
        name: String,
    },
    /// Sessions occupying a spot right now.
    ActiveParkings,
    /// Dashboard counters.
    SystemStatus,
    /// Cancel reservations whose activation window closed.
    PruneExpired,
}

impl Request {
    /// Operation name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Reserve { .. } => "reserve",
            Self::Cancel { .. } => "cancel",
            Self::Enter { .. } => "enter",
            Self::Activate { .. } => "activate",
            Self::Exit { .. } => "exit",
            Self::Extend { .. } => "extend",
            Self::RecoverCode { .. } => "recover_code",
            Self::Availability => "availability",
            Self::History { .. } => "history",
            Self::Report { .. } => "report",
            Self::TimeSlots { .. } => "time_slots",
            Self::RegisterSubscriber { .. } => "register_subscriber",
            Self::UpdateSubscriber { .. } => "update_subscriber",
            Self::GetSubscriber { .. } => "get_subscriber",
            Self::ListSubscribers => "list_subscribers",
            Self::FindSubscribers { .. } => "find_subscribers",
            Self::ActiveParkings => "active_parkings",
            Self::SystemStatus => "system_status",
            Self::PruneExpired => "prune_expired",
        }
    }
}

/// Successful result of a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    /// Reservation created.
    Reserved {
        /// Code for the booking.
        parking_code: ParkingCode,
    },
    /// Reservation cancelled.
    Cancelled,
    /// Walk-in admitted.
    Entered {
        /// Code for the session.
        parking_code: ParkingCode,
        /// Assigned spot.
        spot: SpotId,
    },
    /// Reservation activated.
    Activated {
        /// Assigned spot.
        spot: SpotId,
    },
    /// Session closed.
    Exited(ExitReceipt),
    /// Session extended.
    Extended {
        /// New expected exit.
        expected_exit: NaiveDateTime,
    },
    /// Recovered code.
    Code {
        /// The subscriber's current code.
        parking_code: ParkingCode,
    },
    /// Spot availability.
    Availability(Availability),
    /// Sessions, oldest first.
    Sessions {
        /// Matching sessions.
        sessions: Vec<Session>,
    },
    /// Computed report.
    Report(Box<ParkingReport>),
    /// Bookable slots.
    Slots {
        /// Slots with remaining capacity.
        slots: Vec<SlotAvailability>,
    },
    /// One subscriber.
    Subscriber(Subscriber),
    /// Several subscribers.
    Subscribers {
        /// Matching subscribers.
        subscribers: Vec<Subscriber>,
    },
    /// Dashboard counters.
    Status(SystemStatus),
    /// Expired reservations cancelled.
    Pruned {
        /// How many were cancelled.
        cancelled: usize,
    },
}

/// Error body returned to transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error class.
    pub class: ErrorClass,
    /// Human readable message.
    pub message: String,
}

impl From<&EngineError> for ErrorResponse {
    fn from(err: &EngineError) -> Self {
        Self {
            class: err.class(),
            message: err.to_string(),
        }
    }
}

/// Health response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Spots available.
    pub available: u32,
}

/// Return a health payload.
pub fn health(engine: &Engine) -> Health {
    Health {
        ok: engine.check_consistency().is_ok(),
        available: engine.availability().available,
    }
}

impl Engine {
    /// Execute one request on behalf of `ctx`.
    pub fn handle(&self, ctx: &RequestContext, request: Request) -> EngineResult<Response> {
        let op = request.name();
        tracing::debug!(op, caller = ctx.caller, role = ?ctx.role, channel = ?ctx.channel, "request");
        self.dispatch(ctx, request)
    }

    fn dispatch(&self, ctx: &RequestContext, request: Request) -> EngineResult<Response> {
        match request {
            Request::Reserve { subscriber_id, start } => {
                ctx.authorize_subscriber(subscriber_id)?;
                let parking_code = self.reserve(subscriber_id, &start)?;
                Ok(Response::Reserved { parking_code })
            }
            Request::Cancel {
                subscriber_id,
                parking_code,
            } => {
                ctx.authorize_subscriber(subscriber_id)?;
                self.cancel(subscriber_id, &ParkingCode::parse(&parking_code)?)?;
                Ok(Response::Cancelled)
            }
            Request::Enter { subscriber_id } => {
                ctx.authorize_subscriber(subscriber_id)?;
                let (parking_code, spot) = self.enter_spontaneous(subscriber_id)?;
                Ok(Response::Entered { parking_code, spot })
            }
            Request::Activate { parking_code } => {
                let code = self.owned_code(ctx, &parking_code)?;
                Ok(Response::Activated {
                    spot: self.activate_reservation(&code)?,
                })
            }
            Request::Exit { parking_code } => {
                let code = self.owned_code(ctx, &parking_code)?;
                Ok(Response::Exited(self.exit(&code)?))
            }
            Request::Extend {
                parking_code,
                hours,
            } => {
                let code = self.owned_code(ctx, &parking_code)?;
                Ok(Response::Extended {
                    expected_exit: self.extend(&code, hours)?,
                })
            }
            Request::RecoverCode { subscriber_id } => {
                ctx.authorize_subscriber(subscriber_id)?;
                Ok(Response::Code {
                    parking_code: self.recover_code(subscriber_id)?,
                })
            }
            Request::Availability => Ok(Response::Availability(self.availability())),
            Request::History { subscriber_id } => {
                ctx.authorize_subscriber(subscriber_id)?;
                Ok(Response::Sessions {
                    sessions: self.history(subscriber_id)?,
                })
            }
            Request::Report { kind, period } => {
                ctx.require_role(&[Role::Manager])?;
                let period = match period {
                    Some(period) => period,
                    None => self.current_month()?,
                };
                let report = self.report(kind, period)?;
                Ok(Response::Report(Box::new(report)))
            }
            Request::TimeSlots { date } => Ok(Response::Slots {
                slots: self.available_slots(date)?,
            }),
            Request::RegisterSubscriber { profile } => {
                ctx.require_role(&STAFF)?;
                if profile.role == Role::Manager && ctx.role != Role::Manager {
                    return Err(EngineError::Forbidden(
                        "only managers may create manager accounts".into(),
                    ));
                }
                Ok(Response::Subscriber(self.register_subscriber(profile)?))
            }
            Request::UpdateSubscriber {
                subscriber_id,
                update,
            } => {
                ctx.authorize_subscriber(subscriber_id)?;
                Ok(Response::Subscriber(
                    self.update_subscriber(subscriber_id, update)?,
                ))
            }
            Request::GetSubscriber { subscriber_id } => {
                ctx.authorize_subscriber(subscriber_id)?;
                Ok(Response::Subscriber(self.subscriber(subscriber_id)?))
            }
            Request::ListSubscribers => {
                ctx.require_role(&STAFF)?;
                Ok(Response::Subscribers {
                    subscribers: self.registry().list(),
                })
            }
            Request::FindSubscribers { name } => {
                ctx.require_role(&STAFF)?;
                Ok(Response::Subscribers {
                    subscribers: self.registry().find_by_name(&name),
                })
            }
            Request::ActiveParkings => {
                ctx.require_role(&STAFF)?;
                Ok(Response::Sessions {
                    sessions: self.active_sessions(),
                })
            }
            Request::SystemStatus => Ok(Response::Status(self.system_status())),
            Request::PruneExpired => {
                ctx.require_role(&STAFF)?;
                Ok(Response::Pruned {
                    cancelled: self.prune_expired_reservations(),
                })
            }
        }
    }

    /// Parse a code and, for subscriber callers, confirm they own it.
    fn owned_code(&self, ctx: &RequestContext, raw: &str) -> EngineResult<ParkingCode> {
        let code = ParkingCode::parse(raw)?;
        if !ctx.role.is_staff() && self.store().find_by_code(&code)?.subscriber_id != ctx.caller {
            return Err(EngineError::CodeNotFound);
        }
        Ok(code)
    }
}
