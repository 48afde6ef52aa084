//! Courtside: browser-driven court booking
//!
//! Logs into a club portal, opens the schedule for a day a fixed number of
//! days ahead, finds the requested time slot and books it through the
//! portal's modal form, then re-reads the schedule to confirm the booking.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        BookingWorkflow                           │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  BookingFormFiller ──► SlotFinder ──► DropdownSelector ──► submit │
//! │         │                  │                 │                   │
//! │         └──────────── PageLocator ───────────┘                   │
//! │                            │                                     │
//! │  BookingVerifier ──────────┤                                     │
//! │                            ▼                                     │
//! │                      PortalDriver (CDP / mock)                   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything portal-specific (selectors, markers, URLs) lives in a
//! [`SiteProfile`], loadable from YAML. The built-in default targets
//! `CourtReserve`.

#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

pub mod artifacts;
pub mod browser;
pub mod driver;
#[allow(clippy::missing_errors_doc)]
pub mod dropdown;
#[allow(clippy::missing_errors_doc)]
pub mod form;
pub mod locator;
pub mod navigation;
pub mod request;
pub mod result;
pub mod site;
pub mod slot;
pub mod verify;
pub mod wait;
pub mod workflow;

pub use artifacts::{ArtifactSink, Checkpoint};
#[cfg(feature = "browser")]
pub use browser::ChromiumDriver;
pub use browser::{BrowserConfig, BrowserSession};
pub use driver::{
    ElementHandle, Key, MockDriver, MockEffect, MockElement, MockReaction, MockTrigger,
    PortalDriver,
};
pub use dropdown::{
    ClickStrategy, DropdownSelector, DropdownWidget, KeyboardStrategy, ScriptAssignStrategy,
    SelectionAttempt, SelectionReport, SelectionStrategy,
};
pub use form::{BookingFormFiller, BookingOutcome, WaitSettings};
pub use locator::{PageLocator, Selector, SelectorChain};
pub use request::{BookingRequest, CourtType, Credentials};
pub use result::{BookingError, BookingResult, BookingStep, FailureKind, StepFailure};
pub use site::{
    DatePickerProfile, DateNavigation, DropdownProfile, FormProfile, LoginProfile, PlayerProfile, ScheduleProfile,
    SiteProfile, VerificationProfile,
};
pub use slot::{Availability, ScheduleGrid, ScheduleSlot, SlotFinder};
pub use verify::{expand_indicators, BookingVerifier, IndicatorValues, VerificationOutcome};
pub use wait::{poll_until, WaitOptions};
pub use workflow::{BookingWorkflow, WorkflowReport};
