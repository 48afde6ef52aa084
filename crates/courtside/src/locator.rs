//! PageLocator - find elements through ordered selector chains.
//!
//! Portal markup varies between releases, so nothing in the booking flow
//! depends on a single selector. A [`SelectorChain`] lists alternatives in
//! priority order and [`PageLocator`] returns the first that matches.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::{ElementHandle, PortalDriver};
use crate::result::{BookingError, BookingResult};
use crate::wait::{poll_until, WaitOptions};

/// Selector for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// Element id attribute
    Id(String),
    /// CSS selector (e.g., "button.btn-submit")
    Css(String),
    /// XPath expression
    #[serde(rename = "xpath")]
    XPath(String),
    /// Innermost elements whose text contains the string
    Text(String),
    /// CSS selector filtered by contained text
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
}

impl Selector {
    /// Create an id selector
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a CSS selector with text filter
    #[must_use]
    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    /// JavaScript expression yielding an array of matching elements under `root`.
    ///
    /// `root` must be a JS expression evaluating to a `Document` or `Element`.
    #[must_use]
    pub fn to_elements_js(&self, root: &str) -> String {
        match self {
            Self::Id(id) => format!(
                "Array.from({root}.querySelectorAll('[id=' + CSS.escape({}) + ']'))",
                js_string(id)
            ),
            Self::Css(css) => format!("Array.from({root}.querySelectorAll({}))", js_string(css)),
            Self::XPath(expr) => format!(
                "(() => {{ const s = document.evaluate({}, {root}, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
                 const out = []; for (let i = 0; i < s.snapshotLength; i++) out.push(s.snapshotItem(i)); return out; }})()",
                js_string(expr)
            ),
            Self::Text(text) => {
                let t = js_string(text);
                format!(
                    "Array.from({root}.querySelectorAll('*')).filter(el => el.textContent.includes({t}) \
                     && !Array.from(el.children).some(c => c.textContent.includes({t})))"
                )
            }
            Self::CssWithText { css, text } => format!(
                "Array.from({root}.querySelectorAll({})).filter(el => el.textContent.includes({}))",
                js_string(css),
                js_string(text)
            ),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={id}"),
            Self::Css(css) => write!(f, "css={css}"),
            Self::XPath(expr) => write!(f, "xpath={expr}"),
            Self::Text(text) => write!(f, "text={text}"),
            Self::CssWithText { css, text } => write!(f, "css={css} >> text={text}"),
        }
    }
}

/// Quote a string as a JavaScript literal
#[must_use]
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Ordered list of alternative selectors for one logical element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectorChain(Vec<Selector>);

impl SelectorChain {
    /// Create a chain from selectors in priority order
    #[must_use]
    pub fn new(selectors: Vec<Selector>) -> Self {
        Self(selectors)
    }

    /// Chain with a single CSS selector
    #[must_use]
    pub fn css(css: impl Into<String>) -> Self {
        Self(vec![Selector::css(css)])
    }

    /// Append a fallback selector
    #[must_use]
    pub fn or(mut self, selector: Selector) -> Self {
        self.0.push(selector);
        self
    }

    /// Selectors in priority order
    pub fn iter(&self) -> impl Iterator<Item = &Selector> {
        self.0.iter()
    }

    /// Number of selectors
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the chain has no selectors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display form of every selector, for error reports
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }

    /// CSS selectors of the chain joined into one selector list
    #[must_use]
    pub fn css_union(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .0
            .iter()
            .filter_map(|s| match s {
                Selector::Css(css) => Some(css.as_str()),
                _ => None,
            })
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

impl fmt::Display for SelectorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe().join(" | "))
    }
}

impl From<Selector> for SelectorChain {
    fn from(selector: Selector) -> Self {
        Self(vec![selector])
    }
}

impl FromIterator<Selector> for SelectorChain {
    fn from_iter<I: IntoIterator<Item = Selector>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Locates elements through selector chains.
///
/// By default only visible elements count as matches.
#[derive(Debug)]
pub struct PageLocator<'d, D: ?Sized> {
    driver: &'d D,
    visible_only: bool,
}

impl<'d, D: PortalDriver + ?Sized> PageLocator<'d, D> {
    /// Create a locator that only matches visible elements
    #[must_use]
    pub const fn new(driver: &'d D) -> Self {
        Self {
            driver,
            visible_only: true,
        }
    }

    /// Also match hidden elements
    #[must_use]
    pub const fn including_hidden(mut self) -> Self {
        self.visible_only = false;
        self
    }

    /// First selector in the chain with any match wins; its matches are returned.
    ///
    /// A selector the page cannot evaluate counts as a miss. Stale scopes and
    /// other driver failures propagate.
    pub async fn find_all(
        &self,
        chain: &SelectorChain,
        scope: Option<&ElementHandle>,
    ) -> BookingResult<Vec<ElementHandle>> {
        for selector in chain.iter() {
            let found = match self.driver.query_all(selector, scope).await {
                Ok(found) => found,
                Err(BookingError::Script { message }) => {
                    debug!(%selector, %message, "selector could not be evaluated");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let matches: Vec<ElementHandle> = found
                .into_iter()
                .filter(|h| !self.visible_only || h.visible)
                .collect();
            if !matches.is_empty() {
                debug!(%selector, count = matches.len(), "selector matched");
                return Ok(matches);
            }
        }
        Ok(Vec::new())
    }

    /// First match of the chain, if any
    pub async fn find(
        &self,
        chain: &SelectorChain,
        scope: Option<&ElementHandle>,
    ) -> BookingResult<Option<ElementHandle>> {
        Ok(self.find_all(chain, scope).await?.into_iter().next())
    }

    /// First match of the chain, or `ElementNotFound` listing every selector tried
    pub async fn locate(
        &self,
        chain: &SelectorChain,
        scope: Option<&ElementHandle>,
    ) -> BookingResult<ElementHandle> {
        self.find(chain, scope)
            .await?
            .ok_or_else(|| BookingError::ElementNotFound {
                selectors: chain.describe(),
            })
    }

    /// Poll until the chain matches; times out as `ElementNotFound`
    pub async fn wait_for(
        &self,
        chain: &SelectorChain,
        scope: Option<&ElementHandle>,
        options: &WaitOptions,
    ) -> BookingResult<ElementHandle> {
        let what = chain.to_string();
        poll_until(options, &what, move || self.find(chain, scope))
            .await
            .map_err(|e| match e {
                BookingError::Timeout { .. } => BookingError::ElementNotFound {
                    selectors: chain.describe(),
                },
                other => other,
            })
    }

    /// Poll until the chain has no visible match
    pub async fn wait_until_gone(
        &self,
        chain: &SelectorChain,
        scope: Option<&ElementHandle>,
        options: &WaitOptions,
    ) -> BookingResult<()> {
        let what = format!("{chain} to disappear");
        poll_until(options, &what, move || async move {
            let gone = self.find(chain, scope).await?.is_none();
            Ok::<_, BookingError>(gone.then_some(()))
        })
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::driver::{MockDriver, MockEffect, MockElement, MockReaction, MockTrigger};
    use std::time::Duration;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_display_forms() {
            assert_eq!(Selector::id("ReservationTypeId").to_string(), "id=ReservationTypeId");
            assert_eq!(Selector::css(".k-dropdown").to_string(), "css=.k-dropdown");
            assert_eq!(
                Selector::css_with_text("button", "Reserve").to_string(),
                "css=button >> text=Reserve"
            );
        }

        #[test]
        fn test_js_escapes_quotes() {
            let js = Selector::css("input[name='a\"b']").to_elements_js("document");
            assert!(js.contains(r#""input[name='a\"b']""#));
        }

        #[test]
        fn test_text_query_prefers_innermost() {
            let js = Selector::text("5:00 PM").to_elements_js("root");
            assert!(js.starts_with("Array.from(root.querySelectorAll('*'))"));
            assert!(js.contains("el.children"));
        }

        #[test]
        fn test_xpath_query_uses_snapshot() {
            let js = Selector::xpath("//button").to_elements_js("document");
            assert!(js.contains("ORDERED_NODE_SNAPSHOT_TYPE"));
        }

        #[test]
        fn test_yaml_form() {
            let chain: SelectorChain =
                serde_yaml_ng::from_str("- css: .k-dropdown\n- xpath: //span[@role='listbox']\n").unwrap();
            assert_eq!(chain.len(), 2);
            assert_eq!(chain.iter().nth(1).unwrap(), &Selector::xpath("//span[@role='listbox']"));
        }

        #[test]
        fn test_css_union() {
            let chain = SelectorChain::css(".k-input-inner")
                .or(Selector::text("x"))
                .or(Selector::css(".k-input"));
            assert_eq!(chain.css_union().unwrap(), ".k-input-inner, .k-input");
            assert!(SelectorChain::from(Selector::text("x")).css_union().is_none());
        }
    }

    mod locate_tests {
        use super::*;

        fn driver() -> MockDriver {
            let driver = MockDriver::new();
            driver.add_element(
                MockElement::new(1, "button")
                    .text("Save")
                    .matching(Selector::css("button.legacy"))
                    .hidden(),
            );
            driver.add_element(
                MockElement::new(2, "button")
                    .text("Save")
                    .matching(Selector::css("button.btn-submit")),
            );
            driver
        }

        #[tokio::test]
        async fn test_first_matching_selector_wins() {
            let driver = driver();
            let chain = SelectorChain::css("button.missing").or(Selector::css("button.btn-submit"));
            let found = PageLocator::new(&driver).locate(&chain, None).await.unwrap();
            assert_eq!(found.id, 2);
        }

        #[tokio::test]
        async fn test_hidden_matches_are_skipped() {
            let driver = driver();
            let chain = SelectorChain::css("button.legacy").or(Selector::css("button.btn-submit"));
            let found = PageLocator::new(&driver).locate(&chain, None).await.unwrap();
            assert_eq!(found.id, 2);

            let hidden = PageLocator::new(&driver)
                .including_hidden()
                .locate(&chain, None)
                .await
                .unwrap();
            assert_eq!(hidden.id, 1);
        }

        #[tokio::test]
        async fn test_exhausted_chain_lists_every_selector() {
            let driver = driver();
            let chain = SelectorChain::css("#a").or(Selector::text("nope"));
            let err = PageLocator::new(&driver).locate(&chain, None).await.unwrap_err();
            match err {
                BookingError::ElementNotFound { selectors } => {
                    assert_eq!(selectors, vec!["css=#a".to_string(), "text=nope".to_string()]);
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_for_sees_late_element() {
            let driver = driver();
            driver.add_element(
                MockElement::new(3, "div")
                    .matching(Selector::css(".modal"))
                    .hidden(),
            );
            driver.add_element(MockElement::new(4, "a").matching(Selector::css("a.open")));
            driver.on(MockTrigger::Click(4), MockReaction::effects(vec![MockEffect::Show(3)]));

            let open = PageLocator::new(&driver)
                .locate(&SelectorChain::css("a.open"), None)
                .await
                .unwrap();
            driver.click(&open).await.unwrap();

            let modal = PageLocator::new(&driver)
                .wait_for(&SelectorChain::css(".modal"), None, &WaitOptions::from_millis(500))
                .await
                .unwrap();
            assert_eq!(modal.id, 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_for_times_out_as_not_found() {
            let driver = driver();
            let options = WaitOptions::from_millis(300).with_poll_interval(Duration::from_millis(100));
            let err = PageLocator::new(&driver)
                .wait_for(&SelectorChain::css(".never"), None, &options)
                .await
                .unwrap_err();
            assert!(matches!(err, BookingError::ElementNotFound { .. }));
        }

        #[tokio::test(start_paused = true)]
        async fn test_wait_until_gone() {
            let driver = driver();
            let options = WaitOptions::from_millis(300);
            PageLocator::new(&driver)
                .wait_until_gone(&SelectorChain::css("button.legacy"), None, &options)
                .await
                .unwrap();
            assert!(PageLocator::new(&driver)
                .wait_until_gone(&SelectorChain::css("button.btn-submit"), None, &options)
                .await
                .is_err());
        }
    }
}
