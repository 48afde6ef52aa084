//! Reach the schedule view for a target date.

use std::time::Duration;

use chrono::{Datelike, Days, NaiveDate};
use tracing::{debug, info, warn};

use crate::driver::{ElementHandle, Key, PortalDriver};
use crate::locator::{PageLocator, SelectorChain};
use crate::result::{BookingError, BookingResult};
use crate::site::{DatePickerProfile, DateNavigation, ScheduleProfile};
use crate::wait::WaitOptions;

/// URL for `date` under a `{date}` template
#[must_use]
pub fn schedule_url(template: &str, date_format: &str, date: NaiveDate) -> String {
    template.replace("{date}", &date.format(date_format).to_string())
}

/// Open the schedule showing `date`, `days_ahead` days after today.
///
/// Waits for grid cells to render. A grid that never shows a cell is not an
/// error here: the slot lookup reports it as a missing slot.
pub async fn open_schedule<D: PortalDriver + ?Sized>(
    driver: &D,
    schedule: &ScheduleProfile,
    date: NaiveDate,
    days_ahead: u32,
    wait: &WaitOptions,
) -> BookingResult<()> {
    let locator = PageLocator::new(driver);
    let settle = Duration::from_millis(schedule.settle_ms);
    match &schedule.date_navigation {
        DateNavigation::Url {
            template,
            date_format,
        } => {
            let url = schedule_url(template, date_format, date);
            info!(%url, "opening schedule");
            driver.navigate(&url).await?;
        }
        DateNavigation::NextDayButton { button } => {
            info!(url = %schedule.url, days_ahead, "opening schedule");
            driver.navigate(&schedule.url).await?;
            step_days(driver, button, days_ahead, settle, wait).await?;
        }
        DateNavigation::DatePicker(picker) => {
            info!(url = %schedule.url, %date, "opening schedule");
            driver.navigate(&schedule.url).await?;
            let today = date
                .checked_sub_days(Days::new(u64::from(days_ahead)))
                .unwrap_or(date);
            if pick_date(driver, picker, today, date, settle, wait).await? {
                tokio::time::sleep(settle).await;
            } else {
                warn!(days_ahead, "date picker unavailable, stepping one day at a time");
                step_days(driver, &picker.fallback_button, days_ahead, settle, wait).await?;
            }
        }
    }
    match locator.wait_for(&schedule.cells, None, wait).await {
        Ok(_) => Ok(()),
        Err(BookingError::ElementNotFound { .. }) => {
            warn!(%date, "schedule grid rendered no cells");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn step_days<D: PortalDriver + ?Sized>(
    driver: &D,
    button: &SelectorChain,
    days_ahead: u32,
    settle: Duration,
    wait: &WaitOptions,
) -> BookingResult<()> {
    let locator = PageLocator::new(driver);
    for day in 1..=days_ahead {
        let next = locator.wait_for(button, None, wait).await?;
        driver.click(&next).await?;
        debug!(day, "advanced schedule one day");
        tokio::time::sleep(settle).await;
    }
    Ok(())
}

async fn find_within<D: PortalDriver + ?Sized>(
    driver: &D,
    chain: &SelectorChain,
    wait: &WaitOptions,
) -> BookingResult<Option<ElementHandle>> {
    match PageLocator::new(driver).wait_for(chain, None, wait).await {
        Ok(found) => Ok(Some(found)),
        Err(BookingError::ElementNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// Pick `date` from the calendar popup; `false` when the calendar is unusable.
///
/// The calendar opens on today's month and is paged forward to the target
/// month before the day is clicked. Cells from adjacent months are skipped.
async fn pick_date<D: PortalDriver + ?Sized>(
    driver: &D,
    picker: &DatePickerProfile,
    today: NaiveDate,
    date: NaiveDate,
    settle: Duration,
    wait: &WaitOptions,
) -> BookingResult<bool> {
    let open_wait =
        WaitOptions::from_millis(picker.open_timeout_ms).with_poll_interval(wait.poll_interval);
    let Some(trigger) = find_within(driver, &picker.trigger, &open_wait).await? else {
        debug!("schedule has no date picker");
        return Ok(false);
    };
    driver.click(&trigger).await?;
    if find_within(driver, &picker.calendar, &open_wait).await?.is_none() {
        debug!("date picker did not open");
        return Ok(false);
    }

    let locator = PageLocator::new(driver);
    for month in 0..(month_index(date) - month_index(today)).max(0) {
        let Some(next) = locator.find(&picker.next_month, None).await? else {
            warn!(month, "calendar cannot page forward");
            driver.press_key(&trigger, Key::Escape).await?;
            return Ok(false);
        };
        driver.click(&next).await?;
        tokio::time::sleep(settle).await;
    }

    let day = date.day().to_string();
    for cell in locator.find_all(&picker.day_cells, None).await? {
        if cell.text.trim() != day {
            continue;
        }
        let class = driver.attribute(&cell, "class").await?.unwrap_or_default();
        if !picker.other_month_marker.is_empty() && class.contains(&picker.other_month_marker) {
            continue;
        }
        driver.click(&cell).await?;
        match locator.wait_until_gone(&picker.calendar, None, &open_wait).await {
            Ok(()) => {}
            Err(BookingError::Timeout { .. }) => debug!("calendar stayed open after picking the day"),
            Err(e) => return Err(e),
        }
        info!(%date, "picked date from calendar");
        return Ok(true);
    }

    warn!(%date, "calendar shows no cell for the day");
    driver.press_key(&trigger, Key::Escape).await?;
    Ok(false)
}
