//! Mock portal shared by the booking scenarios.
//!
//! Element ids:
//! - 1..=3 login form
//! - 100.. schedule cells
//! - 200 booking modal, 210.. court type widget, 230.. duration widget
//! - 250 player input, 260 suggestion, 270 submit, 280 error banner

#![allow(dead_code, clippy::unwrap_used)]

use chrono::NaiveDate;
use courtside::{
    BookingRequest, Credentials, DateNavigation, MockDriver, MockEffect, MockElement,
    MockReaction, MockTrigger, Selector, SelectorChain, SiteProfile, WaitOptions, WaitSettings,
};

pub const SLOT: u64 = 100;
pub const MODAL: u64 = 200;
pub const COURT_ROOT: u64 = 210;
pub const COURT_DISPLAY: u64 = 211;
pub const SINGLES: u64 = 220;
pub const SOLO: u64 = 221;
pub const DURATION_ROOT: u64 = 230;
pub const DURATION_DISPLAY: u64 = 231;
pub const FORTY_FIVE: u64 = 241;
pub const PLAYER_INPUT: u64 = 250;
pub const SUGGESTION: u64 = 260;
pub const SUBMIT: u64 = 270;
pub const BANNER: u64 = 280;

/// Name the schedule shows on the member's own bookings
pub const MEMBER: &str = "Sam Member";

const OPTIONS_CSS: &str = ".k-animation-container .k-list li";

pub fn site() -> SiteProfile {
    let mut site = SiteProfile::default();
    site.login.url = "https://club.test/login".into();
    site.schedule.url = "https://club.test/schedule".into();
    site.schedule.date_navigation = DateNavigation::Url {
        template: "https://club.test/schedule/{date}".into(),
        date_format: "%Y-%m-%d".into(),
    };
    site.schedule.cells = SelectorChain::css("td");
    site.schedule.settle_ms = 0;
    site.form.player.suggestion_timeout_ms = 1_000;
    site.verification.member_name = Some(MEMBER.into());
    site
}

pub fn waits() -> WaitSettings {
    WaitSettings {
        element: WaitOptions::from_millis(2_000),
        option: WaitOptions::from_millis(300),
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("member@club.test", "hunter2")
}

pub fn request(player: Option<&str>) -> BookingRequest {
    BookingRequest::new(
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap(),
        14,
        "5:00 PM",
        player.map(String::from),
        45,
    )
    .unwrap()
}

/// Login form whose submit lands on the member portal
pub fn login_page(driver: &MockDriver) {
    driver.add_element(MockElement::new(1, "input").matching(Selector::css("input[type='text']")));
    driver.add_element(
        MockElement::new(2, "input").matching(Selector::css("input[type='password']")),
    );
    driver.add_element(
        MockElement::new(3, "button").matching(Selector::css("button[type='submit']")),
    );
    driver.on(
        MockTrigger::Click(3),
        MockReaction::effects(vec![MockEffect::SetUrl("https://club.test/Portal".into())]),
    );
}

/// Schedule cells, ids from [`SLOT`] upwards
pub fn schedule(driver: &MockDriver, cells: &[(&str, &str)]) {
    for (offset, (text, class)) in (0u64..).zip(cells) {
        driver.add_element(
            MockElement::new(SLOT + offset, "td")
                .text(*text)
                .attr("class", *class)
                .matching(Selector::css("td")),
        );
    }
}

/// Modal opened by clicking the first cell, with both dropdowns, the player
/// field and the submit button
pub fn booking_modal(driver: &MockDriver) {
    driver.add_element(
        MockElement::new(MODAL, "div")
            .hidden()
            .matching(Selector::css(".modal.show")),
    );
    driver.on(MockTrigger::Click(SLOT), MockReaction::effects(vec![MockEffect::Show(MODAL)]));

    dropdown(driver, COURT_ROOT, "Reservation Type", "Select...", "ReservationTypeId");
    option(driver, SINGLES, "Singles");
    option(driver, SOLO, "Solo Practice");
    dropdown(driver, DURATION_ROOT, "Duration", "30 minutes", "Duration");
    option(driver, 240, "30 minutes");
    option(driver, FORTY_FIVE, "45 minutes");

    driver.add_element(
        MockElement::new(PLAYER_INPUT, "input")
            .child_of(MODAL)
            .matching(Selector::css("input[name='OwnersDropdown_input']")),
    );
    driver.add_element(
        MockElement::new(SUGGESTION, "li")
            .text("Jane Doe")
            .hidden()
            .matching(Selector::css(".k-list-item")),
    );
    driver.on(
        MockTrigger::Type(PLAYER_INPUT),
        MockReaction::effects(vec![MockEffect::Show(SUGGESTION)]),
    );
    driver.on(
        MockTrigger::Click(SUGGESTION),
        MockReaction::effects(vec![MockEffect::Hide(SUGGESTION)]),
    );

    driver.add_element(
        MockElement::new(SUBMIT, "button")
            .text("Save")
            .child_of(MODAL)
            .matching(Selector::css("button.btn.btn-primary.btn-submit")),
    );
    driver.add_element(
        MockElement::new(BANNER, "div")
            .hidden()
            .matching(Selector::css(".alert-danger")),
    );
}

fn dropdown(driver: &MockDriver, root: u64, caption: &str, shown: &str, input: &str) {
    driver.add_element(
        MockElement::new(root, "span")
            .text(caption)
            .child_of(MODAL)
            .matching(Selector::css(".k-dropdown")),
    );
    driver.add_element(
        MockElement::new(root + 1, "span")
            .text(shown)
            .child_of(root)
            .matching(Selector::css(".k-input-inner")),
    );
    driver.add_element(
        MockElement::new(root + 2, "input")
            .attr("id", input)
            .hidden()
            .child_of(root),
    );
}

fn option(driver: &MockDriver, id: u64, label: &str) {
    driver.add_element(
        MockElement::new(id, "li")
            .text(label)
            .hidden()
            .matching(Selector::css(OPTIONS_CSS)),
    );
}

/// Clicking the widget opens its popup; clicking an option displays it
pub fn clickable_dropdown(driver: &MockDriver, root: u64, options: &[(u64, &str)]) {
    let popup: Vec<MockEffect> = options.iter().map(|(id, _)| MockEffect::Show(*id)).collect();
    driver.on(MockTrigger::Click(root), MockReaction::effects(popup));
    for (id, label) in options {
        let mut effects = vec![MockEffect::SetText {
            id: root + 1,
            text: (*label).to_string(),
        }];
        effects.extend(options.iter().map(|(other, _)| MockEffect::Hide(*other)));
        driver.on(MockTrigger::Click(*id), MockReaction::effects(effects));
    }
}

pub fn clickable_court_type(driver: &MockDriver) {
    clickable_dropdown(driver, COURT_ROOT, &[(SINGLES, "Singles"), (SOLO, "Solo Practice")]);
}

pub fn clickable_duration(driver: &MockDriver) {
    clickable_dropdown(driver, DURATION_ROOT, &[(240, "30 minutes"), (FORTY_FIVE, "45 minutes")]);
}

/// Submitting closes the modal; the reloaded grid shows `booked_text` in the slot
pub fn submit_accepted(driver: &MockDriver, booked_text: &str) {
    driver.on(
        MockTrigger::Click(SUBMIT),
        MockReaction::effects(vec![
            MockEffect::Hide(MODAL),
            MockEffect::AfterNavigation(vec![
                MockEffect::SetText {
                    id: SLOT,
                    text: booked_text.to_string(),
                },
                MockEffect::SetAttribute {
                    id: SLOT,
                    name: "class".into(),
                    value: "fn-portal-reservation-container".into(),
                },
            ]),
        ]),
    );
}

/// Submitting shows an error banner and leaves the modal open
pub fn submit_rejected(driver: &MockDriver, banner: &str) {
    driver.on(
        MockTrigger::Click(SUBMIT),
        MockReaction::effects(vec![
            MockEffect::SetText {
                id: BANNER,
                text: banner.to_string(),
            },
            MockEffect::Show(BANNER),
        ]),
    );
}

/// Portal on which every step works with the default strategies
pub fn happy_portal(booked_text: &str) -> MockDriver {
    let driver = MockDriver::new();
    driver.set_screenshot(b"\x89PNG\r\n\x1a\n".to_vec());
    login_page(&driver);
    schedule(
        &driver,
        &[
            ("Court 1 5:00 PM Reserve", "slot"),
            ("Court 2 4:15 PM Reserve", "slot"),
        ],
    );
    booking_modal(&driver);
    clickable_court_type(&driver);
    clickable_duration(&driver);
    submit_accepted(&driver, booked_text);
    driver
}

/// Count history entries starting with `prefix`
pub fn calls(driver: &MockDriver, prefix: &str) -> usize {
    driver
        .history()
        .iter()
        .filter(|c| c.starts_with(prefix))
        .count()
}
