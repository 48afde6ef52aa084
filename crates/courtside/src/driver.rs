//! PortalDriver - the browser seam every booking component talks through.
//!
//! Components never touch chromiumoxide directly. They are written against
//! [`PortalDriver`], which has two implementations:
//!
//! - `ChromiumDriver` (feature `browser`): real Chromium over CDP
//! - [`MockDriver`]: scripted in-memory page for unit and scenario tests
//!
//! Element handles are tied to the page generation they were found in. Every
//! navigation or reload starts a new generation and older handles become stale.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::locator::Selector;
use crate::result::{BookingError, BookingResult};

/// Handle to a DOM element found in a specific page generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned element id
    pub id: u64,
    /// Page generation the handle was obtained in
    pub generation: u64,
    /// Lower-case tag name
    pub tag_name: String,
    /// Trimmed text content at query time
    pub text: String,
    /// Whether the element had a layout box at query time
    pub visible: bool,
}

/// Keys the booking flow needs to press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Escape,
    ArrowDown,
}

impl Key {
    /// DOM `KeyboardEvent.key` value
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Enter => "Enter",
            Self::Escape => "Escape",
            Self::ArrowDown => "ArrowDown",
        }
    }

    /// Legacy `keyCode`, still read by jQuery-era widgets
    #[must_use]
    pub const fn key_code(self) -> i64 {
        match self {
            Self::Enter => 13,
            Self::Escape => 27,
            Self::ArrowDown => 40,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Abstract browser driver.
///
/// Every method acts on the single page of the session. None of them wait
/// for elements to appear; bounded waiting lives in [`crate::wait`].
#[async_trait]
pub trait PortalDriver: Send + Sync {
    /// Navigate to URL (starts a new page generation)
    async fn navigate(&self, url: &str) -> BookingResult<()>;

    /// Reload the current page (starts a new page generation)
    async fn reload(&self) -> BookingResult<()>;

    /// Current page URL
    async fn current_url(&self) -> BookingResult<String>;

    /// All elements matching `selector`, in document order, optionally inside `scope`
    async fn query_all(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> BookingResult<Vec<ElementHandle>>;

    /// Click element with a real pointer event
    async fn click(&self, element: &ElementHandle) -> BookingResult<()>;

    /// Give element keyboard focus
    async fn focus(&self, element: &ElementHandle) -> BookingResult<()>;

    /// Press a key while element has focus
    async fn press_key(&self, element: &ElementHandle, key: Key) -> BookingResult<()>;

    /// Type text into element
    async fn type_text(&self, element: &ElementHandle, text: &str) -> BookingResult<()>;

    /// Clear an input's value
    async fn clear(&self, element: &ElementHandle) -> BookingResult<()>;

    /// Current trimmed text of element
    async fn text(&self, element: &ElementHandle) -> BookingResult<String>;

    /// Attribute value, `None` when absent
    async fn attribute(&self, element: &ElementHandle, name: &str) -> BookingResult<Option<String>>;

    /// Evaluate a script expression in the page and return its JSON value
    async fn execute_script(&self, script: &str) -> BookingResult<Value>;

    /// Run a function body with the element bound to `el`
    async fn call_on(&self, element: &ElementHandle, body: &str) -> BookingResult<Value>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> BookingResult<Vec<u8>>;

    /// Close the browser
    async fn close(&self) -> BookingResult<()>;
}

// ============================================================================
// Mock driver
// ============================================================================

/// Element on the mock page
#[derive(Debug, Clone)]
pub struct MockElement {
    /// Element id, also used as handle id
    pub id: u64,
    /// Tag name
    pub tag_name: String,
    /// Text content
    pub text: String,
    /// Attributes
    pub attributes: BTreeMap<String, String>,
    /// Whether the element is displayed
    pub visible: bool,
    /// Parent element id
    pub parent: Option<u64>,
    /// Selectors this element answers to, besides text matching
    pub selectors: Vec<Selector>,
    /// Typed input value
    pub value: String,
}

impl MockElement {
    /// Create a visible element
    #[must_use]
    pub fn new(id: u64, tag_name: impl Into<String>) -> Self {
        Self {
            id,
            tag_name: tag_name.into(),
            text: String::new(),
            attributes: BTreeMap::new(),
            visible: true,
            parent: None,
            selectors: Vec::new(),
            value: String::new(),
        }
    }

    /// Set text content
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.attributes.insert(name.into(), value.into());
        self
    }

    /// Start hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Nest under another element
    #[must_use]
    pub const fn child_of(mut self, parent: u64) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Answer to a selector
    #[must_use]
    pub fn matching(mut self, selector: Selector) -> Self {
        self.selectors.push(selector);
        self
    }

    fn matches(&self, selector: &Selector) -> bool {
        if self.selectors.contains(selector) {
            return true;
        }
        match selector {
            Selector::Text(needle) => self.text.contains(needle.as_str()),
            Selector::CssWithText { css, text } => {
                self.selectors.contains(&Selector::Css(css.clone()))
                    && self.text.contains(text.as_str())
            }
            Selector::Id(id) => self.attributes.get("id") == Some(id),
            _ => false,
        }
    }
}

/// What happens when a trigger fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEffect {
    /// Replace an element's text
    SetText { id: u64, text: String },
    /// Set an attribute
    SetAttribute { id: u64, name: String, value: String },
    /// Display an element
    Show(u64),
    /// Hide an element
    Hide(u64),
    /// Change the current URL without a new generation
    SetUrl(String),
    /// Apply these effects after the next navigation or reload
    AfterNavigation(Vec<MockEffect>),
}

/// Event that fires a reaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockTrigger {
    /// Element was clicked
    Click(u64),
    /// Key pressed on element
    Key(u64, Key),
    /// Text typed into element
    Type(u64),
    /// Script containing this substring was evaluated
    Script(String),
    /// Navigation to a URL containing this substring
    Navigate(String),
}

/// Reaction registered for a trigger
#[derive(Debug, Clone, Default)]
pub struct MockReaction {
    /// Value returned by scripts
    pub result: Value,
    /// Effects applied in order
    pub effects: Vec<MockEffect>,
    /// Fail the triggering call with this message
    pub failure: Option<String>,
}

impl MockReaction {
    /// Reaction that only applies effects
    #[must_use]
    pub fn effects(effects: Vec<MockEffect>) -> Self {
        Self {
            effects,
            ..Self::default()
        }
    }

    /// Reaction returning a script value
    #[must_use]
    pub fn returning(result: Value) -> Self {
        Self {
            result,
            ..Self::default()
        }
    }

    /// Reaction that fails the call
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Add effects
    #[must_use]
    pub fn with_effects(mut self, effects: Vec<MockEffect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    generation: u64,
    elements: Vec<MockElement>,
    reactions: Vec<(MockTrigger, MockReaction)>,
    after_navigation: Vec<MockEffect>,
    history: Vec<String>,
    screenshot: Vec<u8>,
    closed: bool,
}

impl MockState {
    fn element(&self, id: u64) -> Option<&MockElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    fn element_mut(&mut self, id: u64) -> Option<&mut MockElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }

    fn is_inside(&self, id: u64, ancestor: u64) -> bool {
        let mut current = self.element(id).and_then(|e| e.parent);
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.element(parent).and_then(|e| e.parent);
        }
        false
    }

    fn handle(&self, element: &MockElement) -> ElementHandle {
        ElementHandle {
            id: element.id,
            generation: self.generation,
            tag_name: element.tag_name.clone(),
            text: element.text.trim().to_string(),
            visible: element.visible,
        }
    }

    fn check(&self, handle: &ElementHandle) -> BookingResult<&MockElement> {
        if handle.generation != self.generation {
            return Err(BookingError::StaleElement {
                id: handle.id,
                generation: handle.generation,
                current: self.generation,
            });
        }
        self.element(handle.id)
            .ok_or_else(|| BookingError::browser(format!("no element with id {}", handle.id)))
    }

    fn check_interactable(&self, handle: &ElementHandle) -> BookingResult<()> {
        let element = self.check(handle)?;
        if element.visible {
            Ok(())
        } else {
            Err(BookingError::browser(format!(
                "element {} is not interactable",
                handle.id
            )))
        }
    }

    fn fire(&mut self, trigger: &MockTrigger) -> BookingResult<Value> {
        let reactions: Vec<MockReaction> = self
            .reactions
            .iter()
            .filter(|(t, _)| trigger_matches(t, trigger))
            .map(|(_, r)| r.clone())
            .collect();
        let mut result = Value::Null;
        for reaction in reactions {
            if let Some(message) = reaction.failure {
                return Err(BookingError::browser(message));
            }
            self.apply(reaction.effects);
            if !reaction.result.is_null() {
                result = reaction.result;
            }
        }
        Ok(result)
    }

    fn apply(&mut self, effects: Vec<MockEffect>) {
        for effect in effects {
            match effect {
                MockEffect::SetText { id, text } => {
                    if let Some(e) = self.element_mut(id) {
                        e.text = text;
                    }
                }
                MockEffect::SetAttribute { id, name, value } => {
                    if let Some(e) = self.element_mut(id) {
                        let _ = e.attributes.insert(name, value);
                    }
                }
                MockEffect::Show(id) => {
                    if let Some(e) = self.element_mut(id) {
                        e.visible = true;
                    }
                }
                MockEffect::Hide(id) => {
                    if let Some(e) = self.element_mut(id) {
                        e.visible = false;
                    }
                }
                MockEffect::SetUrl(url) => self.url = url,
                MockEffect::AfterNavigation(deferred) => self.after_navigation.extend(deferred),
            }
        }
    }

    fn new_generation(&mut self) {
        self.generation += 1;
        let deferred = std::mem::take(&mut self.after_navigation);
        self.apply(deferred);
    }
}

fn trigger_matches(registered: &MockTrigger, fired: &MockTrigger) -> bool {
    match (registered, fired) {
        (MockTrigger::Script(needle), MockTrigger::Script(script)) => script.contains(needle.as_str()),
        (MockTrigger::Navigate(needle), MockTrigger::Navigate(url)) => url.contains(needle.as_str()),
        _ => registered == fired,
    }
}

/// Mock driver for unit testing
///
/// Elements are registered up front and shown, hidden or rewritten by
/// reactions. Every driver call is recorded in the call history.
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a mock element
    pub fn add_element(&self, element: MockElement) {
        self.lock().elements.push(element);
    }

    /// Register a reaction
    pub fn on(&self, trigger: MockTrigger, reaction: MockReaction) {
        self.lock().reactions.push((trigger, reaction));
    }

    /// Set mock screenshot bytes
    pub fn set_screenshot(&self, data: Vec<u8>) {
        self.lock().screenshot = data;
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check if a call starting with `prefix` was made
    #[must_use]
    pub fn was_called(&self, prefix: &str) -> bool {
        self.lock().history.iter().any(|c| c.starts_with(prefix))
    }

    /// Current text of an element
    #[must_use]
    pub fn element_text(&self, id: u64) -> Option<String> {
        self.lock().element(id).map(|e| e.text.clone())
    }

    /// Current typed value of an element
    #[must_use]
    pub fn element_value(&self, id: u64) -> Option<String> {
        self.lock().element(id).map(|e| e.value.clone())
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[async_trait]
impl PortalDriver for MockDriver {
    async fn navigate(&self, url: &str) -> BookingResult<()> {
        let mut state = self.lock();
        state.history.push(format!("navigate:{url}"));
        state.url = url.to_string();
        state.new_generation();
        let _ = state.fire(&MockTrigger::Navigate(url.to_string()))?;
        Ok(())
    }

    async fn reload(&self) -> BookingResult<()> {
        let mut state = self.lock();
        state.history.push("reload".to_string());
        state.new_generation();
        Ok(())
    }

    async fn current_url(&self) -> BookingResult<String> {
        Ok(self.lock().url.clone())
    }

    async fn query_all(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> BookingResult<Vec<ElementHandle>> {
        let state = self.lock();
        let scope_id = match scope {
            Some(handle) => Some(state.check(handle)?.id),
            None => None,
        };
        Ok(state
            .elements
            .iter()
            .filter(|e| e.matches(selector))
            .filter(|e| scope_id.map_or(true, |s| state.is_inside(e.id, s)))
            .map(|e| state.handle(e))
            .collect())
    }

    async fn click(&self, element: &ElementHandle) -> BookingResult<()> {
        let mut state = self.lock();
        state.history.push(format!("click:{}", element.id));
        state.check_interactable(element)?;
        let _ = state.fire(&MockTrigger::Click(element.id))?;
        Ok(())
    }

    async fn focus(&self, element: &ElementHandle) -> BookingResult<()> {
        let mut state = self.lock();
        state.history.push(format!("focus:{}", element.id));
        state.check_interactable(element)
    }

    async fn press_key(&self, element: &ElementHandle, key: Key) -> BookingResult<()> {
        let mut state = self.lock();
        state.history.push(format!("key:{}:{key}", element.id));
        state.check_interactable(element)?;
        let _ = state.fire(&MockTrigger::Key(element.id, key))?;
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> BookingResult<()> {
        let mut state = self.lock();
        state.history.push(format!("type:{}:{text}", element.id));
        state.check_interactable(element)?;
        if let Some(e) = state.element_mut(element.id) {
            e.value.push_str(text);
        }
        let _ = state.fire(&MockTrigger::Type(element.id))?;
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> BookingResult<()> {
        let mut state = self.lock();
        state.history.push(format!("clear:{}", element.id));
        state.check(element)?;
        if let Some(e) = state.element_mut(element.id) {
            e.value.clear();
        }
        Ok(())
    }

    async fn text(&self, element: &ElementHandle) -> BookingResult<String> {
        let state = self.lock();
        Ok(state.check(element)?.text.trim().to_string())
    }

    async fn attribute(&self, element: &ElementHandle, name: &str) -> BookingResult<Option<String>> {
        let state = self.lock();
        Ok(state.check(element)?.attributes.get(name).cloned())
    }

    async fn execute_script(&self, script: &str) -> BookingResult<Value> {
        let mut state = self.lock();
        state.history.push("script".to_string());
        state.fire(&MockTrigger::Script(script.to_string()))
    }

    async fn call_on(&self, element: &ElementHandle, body: &str) -> BookingResult<Value> {
        let mut state = self.lock();
        state.history.push(format!("call_on:{}", element.id));
        state.check(element)?;
        state.fire(&MockTrigger::Script(body.to_string()))
    }

    async fn screenshot(&self) -> BookingResult<Vec<u8>> {
        let mut state = self.lock();
        state.history.push("screenshot".to_string());
        Ok(state.screenshot.clone())
    }

    async fn close(&self) -> BookingResult<()> {
        let mut state = self.lock();
        state.history.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn button(id: u64, text: &str) -> MockElement {
        MockElement::new(id, "button")
            .text(text)
            .matching(Selector::css("button"))
    }

    mod query_tests {
        use super::*;

        #[tokio::test]
        async fn test_query_returns_document_order() {
            let driver = MockDriver::new();
            driver.add_element(button(1, "Reserve 4:30 PM"));
            driver.add_element(button(2, "Reserve 5:00 PM"));

            let found = driver.query_all(&Selector::css("button"), None).await.unwrap();
            assert_eq!(found.iter().map(|h| h.id).collect::<Vec<_>>(), vec![1, 2]);
        }

        #[tokio::test]
        async fn test_text_selector_matches_substring() {
            let driver = MockDriver::new();
            driver.add_element(button(1, "Reserve 5:00 PM"));

            let found = driver.query_all(&Selector::text("5:00"), None).await.unwrap();
            assert_eq!(found.len(), 1);
        }

        #[tokio::test]
        async fn test_scope_limits_to_descendants() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new(1, "div").matching(Selector::css(".modal")));
            driver.add_element(button(2, "Save").child_of(1));
            driver.add_element(button(3, "Save"));

            let modal = driver.query_all(&Selector::css(".modal"), None).await.unwrap();
            let inside = driver
                .query_all(&Selector::css("button"), modal.first())
                .await
                .unwrap();
            assert_eq!(inside.len(), 1);
            assert_eq!(inside[0].id, 2);
        }

        #[tokio::test]
        async fn test_id_selector_uses_attribute() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new(9, "input").attr("id", "ReservationTypeId"));

            let found = driver
                .query_all(&Selector::id("ReservationTypeId"), None)
                .await
                .unwrap();
            assert_eq!(found[0].id, 9);
        }
    }

    mod generation_tests {
        use super::*;

        #[tokio::test]
        async fn test_navigation_makes_handles_stale() {
            let driver = MockDriver::new();
            driver.add_element(button(1, "Reserve"));
            let handle = driver.query_all(&Selector::css("button"), None).await.unwrap()[0].clone();

            driver.navigate("https://club.example/schedule").await.unwrap();

            let err = driver.click(&handle).await.unwrap_err();
            assert!(matches!(err, BookingError::StaleElement { .. }));
        }

        #[tokio::test]
        async fn test_reload_applies_deferred_effects() {
            let driver = MockDriver::new();
            driver.add_element(button(1, "Reserve 5:00 PM"));
            driver.on(
                MockTrigger::Click(1),
                MockReaction::effects(vec![MockEffect::AfterNavigation(vec![
                    MockEffect::SetText {
                        id: 1,
                        text: "Singles 5:00 PM".to_string(),
                    },
                ])]),
            );
            let handle = driver.query_all(&Selector::css("button"), None).await.unwrap()[0].clone();
            driver.click(&handle).await.unwrap();
            assert_eq!(driver.element_text(1).unwrap(), "Reserve 5:00 PM");

            driver.reload().await.unwrap();
            assert_eq!(driver.element_text(1).unwrap(), "Singles 5:00 PM");
        }
    }

    mod reaction_tests {
        use super::*;

        #[tokio::test]
        async fn test_click_reaction_shows_element() {
            let driver = MockDriver::new();
            driver.add_element(button(1, "Open"));
            driver.add_element(MockElement::new(2, "div").hidden());
            driver.on(MockTrigger::Click(1), MockReaction::effects(vec![MockEffect::Show(2)]));

            let handle = driver.query_all(&Selector::css("button"), None).await.unwrap()[0].clone();
            driver.click(&handle).await.unwrap();

            let all = driver.query_all(&Selector::text(""), None).await.unwrap();
            assert!(all.iter().all(|h| h.visible));
        }

        #[tokio::test]
        async fn test_hidden_element_is_not_clickable() {
            let driver = MockDriver::new();
            driver.add_element(button(1, "Save").hidden());
            let handle = driver.query_all(&Selector::css("button"), None).await.unwrap()[0].clone();

            assert!(driver.click(&handle).await.is_err());
            assert!(driver.was_called("click:1"));
        }

        #[tokio::test]
        async fn test_script_reaction_returns_value() {
            let driver = MockDriver::new();
            driver.on(
                MockTrigger::Script("kendoDropDownList".to_string()),
                MockReaction::returning(json!({"ok": true})),
            );

            let value = driver
                .execute_script("jQuery(x).data('kendoDropDownList')")
                .await
                .unwrap();
            assert_eq!(value, json!({"ok": true}));
            assert_eq!(driver.execute_script("1 + 1").await.unwrap(), Value::Null);
        }

        #[tokio::test]
        async fn test_failing_reaction_fails_call() {
            let driver = MockDriver::new();
            driver.add_element(button(1, "Save"));
            driver.on(MockTrigger::Click(1), MockReaction::failing("intercepted"));
            let handle = driver.query_all(&Selector::css("button"), None).await.unwrap()[0].clone();

            let err = driver.click(&handle).await.unwrap_err();
            assert!(err.to_string().contains("intercepted"));
        }

        #[tokio::test]
        async fn test_typing_accumulates_value() {
            let driver = MockDriver::new();
            driver.add_element(MockElement::new(4, "input").matching(Selector::css("input")));
            let handle = driver.query_all(&Selector::css("input"), None).await.unwrap()[0].clone();

            driver.type_text(&handle, "Jane ").await.unwrap();
            driver.type_text(&handle, "Doe").await.unwrap();
            assert_eq!(driver.element_value(4).unwrap(), "Jane Doe");

            driver.clear(&handle).await.unwrap();
            assert_eq!(driver.element_value(4).unwrap(), "");
        }
    }

    #[tokio::test]
    async fn test_close_is_recorded() {
        let driver = MockDriver::new();
        driver.close().await.unwrap();
        assert!(driver.is_closed());
        assert!(driver.was_called("close"));
    }

    #[test]
    fn test_key_codes() {
        assert_eq!(Key::Enter.key_code(), 13);
        assert_eq!(Key::ArrowDown.key(), "ArrowDown");
        assert_eq!(Key::Escape.to_string(), "Escape");
    }
}
