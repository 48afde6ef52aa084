//! DropdownSelector - choose an option in a widget-library dropdown.
//!
//! The portal's dropdowns are Kendo widgets: a styled `span` standing in for
//! a hidden `<input>`, with the option list rendered into a detached popup.
//! No single interaction works reliably across page states, so selection
//! runs an ordered list of [`SelectionStrategy`] implementations and stops
//! at the first one whose result reads back correctly.
//!
//! Read-back is the same for every strategy: the widget's displayed value
//! must equal the requested label, compared trimmed and case-insensitively.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::driver::{ElementHandle, Key, PortalDriver};
use crate::locator::{js_string, PageLocator, SelectorChain};
use crate::result::{BookingError, BookingResult};
use crate::wait::{poll_until, WaitOptions};

/// Upper bound on arrow presses when the option count is unknown
pub const DEFAULT_MAX_KEY_STEPS: usize = 25;

/// A dropdown widget located on the page
#[derive(Debug, Clone)]
pub struct DropdownWidget {
    /// Clickable root of the widget
    pub root: ElementHandle,
    /// Element inside the root that shows the current value
    pub display: SelectorChain,
    /// Option entries of the open popup, page-wide
    pub options: SelectorChain,
    /// Option highlighted during keyboard navigation, page-wide
    pub focused_option: SelectorChain,
    /// Id of the hidden input backing the widget
    pub backing_input: Option<String>,
}

/// Record of one strategy attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionAttempt {
    /// Strategy name
    pub strategy: String,
    /// Whether the strategy's result read back correctly
    pub succeeded: bool,
    /// Why the attempt failed
    pub error_detail: Option<String>,
}

impl SelectionAttempt {
    /// Successful attempt
    #[must_use]
    pub fn succeeded(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            succeeded: true,
            error_detail: None,
        }
    }

    /// Failed attempt
    #[must_use]
    pub fn failed(strategy: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }
}

/// Outcome of a successful selection
#[derive(Debug, Clone, Serialize)]
pub struct SelectionReport {
    /// Requested label
    pub label: String,
    /// Strategy that produced the selection
    pub strategy: String,
    /// Value the widget displayed afterwards
    pub displayed: String,
    /// Every attempt, in order, ending with the successful one
    pub attempts: Vec<SelectionAttempt>,
}

/// One way of driving a dropdown to a label.
///
/// A strategy returns `Ok` when it finished its interaction. Whether the
/// selection actually took is decided by the read-back afterwards.
#[async_trait]
pub trait SelectionStrategy: Send + Sync + fmt::Debug {
    /// Name used in logs and attempt records
    fn name(&self) -> &'static str;

    /// Drive `widget` towards `label`
    async fn attempt(
        &self,
        driver: &dyn PortalDriver,
        widget: &DropdownWidget,
        label: &str,
    ) -> BookingResult<()>;
}

/// Compare labels the way read-back does
#[must_use]
pub fn labels_match(displayed: &str, label: &str) -> bool {
    squash(displayed) == squash(label)
}

fn squash(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Text currently displayed by the widget
pub async fn displayed_value(
    driver: &dyn PortalDriver,
    widget: &DropdownWidget,
) -> BookingResult<String> {
    let locator = PageLocator::new(driver).including_hidden();
    match locator.find(&widget.display, Some(&widget.root)).await? {
        Some(display) => driver.text(&display).await,
        None => driver.text(&widget.root).await,
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Open the popup with a pointer click and click the matching option
#[derive(Debug, Clone)]
pub struct ClickStrategy {
    /// How long to wait for the option list to render
    pub option_wait: WaitOptions,
}

#[async_trait]
impl SelectionStrategy for ClickStrategy {
    fn name(&self) -> &'static str {
        "click"
    }

    async fn attempt(
        &self,
        driver: &dyn PortalDriver,
        widget: &DropdownWidget,
        label: &str,
    ) -> BookingResult<()> {
        driver.click(&widget.root).await?;
        let locator = &PageLocator::new(driver);
        let what = format!("option {label:?}");
        let option = poll_until(&self.option_wait, &what, move || async move {
            let options = locator.find_all(&widget.options, None).await?;
            Ok::<_, BookingError>(options.into_iter().find(|o| labels_match(&o.text, label)))
        })
        .await?;
        driver.click(&option).await
    }
}

/// Focus the widget, open it with Enter and walk options with ArrowDown
#[derive(Debug, Clone)]
pub struct KeyboardStrategy {
    /// Pause after each key press
    pub key_delay: Duration,
    /// Arrow presses allowed when the option count cannot be read
    pub max_steps: usize,
}

impl Default for KeyboardStrategy {
    fn default() -> Self {
        Self {
            key_delay: Duration::from_millis(150),
            max_steps: DEFAULT_MAX_KEY_STEPS,
        }
    }
}

impl KeyboardStrategy {
    async fn highlighted(
        &self,
        driver: &dyn PortalDriver,
        widget: &DropdownWidget,
    ) -> BookingResult<String> {
        let locator = PageLocator::new(driver);
        match locator.find(&widget.focused_option, None).await? {
            Some(option) => driver.text(&option).await,
            None => displayed_value(driver, widget).await,
        }
    }

    async fn press(&self, driver: &dyn PortalDriver, root: &ElementHandle, key: Key) -> BookingResult<()> {
        driver.press_key(root, key).await?;
        tokio::time::sleep(self.key_delay).await;
        Ok(())
    }
}

#[async_trait]
impl SelectionStrategy for KeyboardStrategy {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    async fn attempt(
        &self,
        driver: &dyn PortalDriver,
        widget: &DropdownWidget,
        label: &str,
    ) -> BookingResult<()> {
        driver.focus(&widget.root).await?;
        self.press(driver, &widget.root, Key::Enter).await?;

        let option_count = PageLocator::new(driver)
            .including_hidden()
            .find_all(&widget.options, None)
            .await?
            .len();
        let steps = if option_count == 0 {
            self.max_steps
        } else {
            option_count
        };
        let wanted = squash(label);

        for _ in 0..=steps {
            let current = squash(&self.highlighted(driver, widget).await?);
            if current.starts_with(&wanted) {
                return self.press(driver, &widget.root, Key::Enter).await;
            }
            self.press(driver, &widget.root, Key::ArrowDown).await?;
        }
        Err(BookingError::script(format!(
            "no option starting with {label:?} after {steps} key presses"
        )))
    }
}

/// Assign the value through the widget's script API, or the backing input
#[derive(Debug, Clone, Default)]
pub struct ScriptAssignStrategy;

impl ScriptAssignStrategy {
    fn script(widget: &DropdownWidget, label: &str) -> String {
        let input = widget
            .backing_input
            .as_deref()
            .map_or_else(|| "null".to_string(), js_string);
        let display_css = widget
            .display
            .css_union()
            .map_or_else(|| "null".to_string(), |c| js_string(&c));
        format!(
            r"const label = {label};
const norm = s => String(s == null ? '' : s).replace(/\s+/g, ' ').trim().toLowerCase();
const inputId = {input};
const input = inputId ? document.getElementById(inputId) : el.querySelector('input, select');
const widget = (window.jQuery && input) ? window.jQuery(input).data('kendoDropDownList') : null;
if (widget) {{
  const field = widget.options.dataTextField;
  const items = widget.dataSource.data();
  let index = -1;
  for (let i = 0; i < items.length; i++) {{
    const text = field ? items[i][field] : items[i];
    if (norm(text) === norm(label)) {{ index = i; break; }}
  }}
  if (index < 0) return {{ ok: false, reason: 'no data item for label' }};
  widget.select(index);
  widget.trigger('change');
  return {{ ok: true, via: 'kendoDropDownList' }};
}}
if (!input) return {{ ok: false, reason: 'no backing input' }};
if (input.tagName === 'SELECT') {{
  const opt = Array.from(input.options).find(o => norm(o.text) === norm(label));
  if (!opt) return {{ ok: false, reason: 'no select option for label' }};
  input.value = opt.value;
}} else {{
  input.value = label;
}}
const displayCss = {display_css};
const display = displayCss ? el.querySelector(displayCss) : null;
if (display) display.textContent = label;
for (const type of ['input', 'change']) input.dispatchEvent(new Event(type, {{ bubbles: true }}));
return {{ ok: true, via: 'input' }};",
            label = js_string(label),
        )
    }
}

#[async_trait]
impl SelectionStrategy for ScriptAssignStrategy {
    fn name(&self) -> &'static str {
        "script-assign"
    }

    async fn attempt(
        &self,
        driver: &dyn PortalDriver,
        widget: &DropdownWidget,
        label: &str,
    ) -> BookingResult<()> {
        let result = driver.call_on(&widget.root, &Self::script(widget, label)).await?;
        if result.get("ok").and_then(Value::as_bool) == Some(true) {
            debug!(via = ?result.get("via"), "value assigned by script");
            Ok(())
        } else {
            let reason = result
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("script returned no result");
            Err(BookingError::script(reason))
        }
    }
}

// ============================================================================
// Selector
// ============================================================================

/// Runs selection strategies in order until one reads back correctly
#[derive(Debug)]
pub struct DropdownSelector {
    strategies: Vec<Box<dyn SelectionStrategy>>,
}

impl Default for DropdownSelector {
    fn default() -> Self {
        Self::standard(WaitOptions::from_millis(crate::wait::DEFAULT_OPTION_TIMEOUT_MS))
    }
}

impl DropdownSelector {
    /// Click, then keyboard, then script assignment
    #[must_use]
    pub fn standard(option_wait: WaitOptions) -> Self {
        Self::with_strategies(vec![
            Box::new(ClickStrategy { option_wait }),
            Box::new(KeyboardStrategy::default()),
            Box::new(ScriptAssignStrategy),
        ])
    }

    /// Use a custom strategy list
    #[must_use]
    pub fn with_strategies(strategies: Vec<Box<dyn SelectionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Strategy names in the order they run
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Select `label`, trying each strategy until the widget reads it back.
    ///
    /// Fails with `DropdownSelectionFailed` carrying every attempt when no
    /// strategy succeeds.
    pub async fn select(
        &self,
        driver: &dyn PortalDriver,
        widget: &DropdownWidget,
        label: &str,
    ) -> BookingResult<SelectionReport> {
        let mut attempts = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            let name = strategy.name();
            debug!(strategy = name, label, "trying dropdown strategy");
            if let Err(e) = strategy.attempt(driver, widget, label).await {
                warn!(strategy = name, error = %e, "dropdown strategy failed");
                attempts.push(SelectionAttempt::failed(name, e.to_string()));
                continue;
            }
            match displayed_value(driver, widget).await {
                Ok(displayed) if labels_match(&displayed, label) => {
                    info!(strategy = name, label, "dropdown option selected");
                    attempts.push(SelectionAttempt::succeeded(name));
                    return Ok(SelectionReport {
                        label: label.to_string(),
                        strategy: name.to_string(),
                        displayed,
                        attempts,
                    });
                }
                Ok(displayed) => {
                    warn!(strategy = name, %displayed, "dropdown read back a different value");
                    attempts.push(SelectionAttempt::failed(
                        name,
                        format!("read back {displayed:?}"),
                    ));
                }
                Err(e) => attempts.push(SelectionAttempt::failed(name, e.to_string())),
            }
        }
        Err(BookingError::DropdownSelectionFailed {
            label: label.to_string(),
            attempts,
        })
    }
}
