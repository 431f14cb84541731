//! Scripted in-memory directory page.
//!
//! `MockSite` answers the selectors in [`SiteSelectors`] the way the real
//! directory does: clicking a menu link activates that menu's listing on page
//! one, clicking a page control switches the visible items. Failure knobs on
//! [`MockMenu`] drive the isolation paths of the walker.

use crate::config::SiteSelectors;
use crate::error::{Result, ScanError};
use crate::page::{BrowserSession, PageElement, RenderedPage, SessionLauncher};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
pub struct MockItem {
    brand_name: Option<String>,
    location: Option<String>,
    category: Option<String>,
    phone: Option<String>,
}

impl MockItem {
    pub fn new(brand_name: &str, location: &str, category: &str, phone: &str) -> Self {
        Self {
            brand_name: Some(brand_name.to_string()),
            location: Some(location.to_string()),
            category: Some(category.to_string()),
            phone: Some(phone.to_string()),
        }
    }

    pub fn without_brand_name(mut self) -> Self {
        self.brand_name = None;
        self
    }

    pub fn without_location(mut self) -> Self {
        self.location = None;
        self
    }

    pub fn without_category(mut self) -> Self {
        self.category = None;
        self
    }

    pub fn without_phone(mut self) -> Self {
        self.phone = None;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MockMenu {
    label: String,
    visible: bool,
    hidden_after: Option<usize>,
    pages: Vec<Vec<MockItem>>,
    fail_activation: bool,
    missing_listing: bool,
    panic_on_activate: bool,
    broken_pages: HashSet<u32>,
    page_values: Option<Vec<String>>,
}

impl MockMenu {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            visible: true,
            hidden_after: None,
            pages: Vec::new(),
            fail_activation: false,
            missing_listing: false,
            panic_on_activate: false,
            broken_pages: HashSet::new(),
            page_values: None,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Disappears from the visible set once the menu at underlying index
    /// `menu` has been activated.
    pub fn hidden_after_activation_of(mut self, menu: usize) -> Self {
        self.hidden_after = Some(menu);
        self
    }

    pub fn with_page(mut self, items: Vec<MockItem>) -> Self {
        self.pages.push(items);
        self
    }

    /// Clicking the menu link errors.
    pub fn failing_activation(mut self) -> Self {
        self.fail_activation = true;
        self
    }

    /// The listing container never renders after activation.
    pub fn without_listing(mut self) -> Self {
        self.missing_listing = true;
        self
    }

    /// Clicking the menu link panics.
    pub fn panicking(mut self) -> Self {
        self.panic_on_activate = true;
        self
    }

    /// The control for `page` never becomes available.
    pub fn with_broken_page(mut self, page: u32) -> Self {
        self.broken_pages.insert(page);
        self
    }

    /// Override the `data-value`s exposed by the pagination links.
    pub fn with_page_values(mut self, values: &[&str]) -> Self {
        self.page_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    fn page_count(&self) -> u32 {
        u32::try_from(self.pages.len()).unwrap_or(u32::MAX)
    }
}

#[derive(Debug, Default)]
struct MockState {
    active_menu: Option<usize>,
    current_page: u32,
    activations: Vec<usize>,
    page_clicks: Vec<u32>,
    scrolls: usize,
    popup_present: bool,
    popup_dismissed: bool,
}

#[derive(Debug)]
struct MockInner {
    selectors: SiteSelectors,
    menus: Vec<MockMenu>,
    fail_menu_lookup: bool,
    state: Mutex<MockState>,
}

impl MockInner {
    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_menu_visible(&self, menu: &MockMenu) -> bool {
        match menu.hidden_after {
            Some(trigger) => menu.visible && !self.state().activations.contains(&trigger),
            None => menu.visible,
        }
    }

    fn active(&self) -> Option<(usize, &MockMenu, u32)> {
        let state = self.state();
        let index = state.active_menu?;
        let menu = self.menus.get(index)?;
        Some((index, menu, state.current_page))
    }
}

#[derive(Debug, Clone)]
enum Node {
    Popup,
    MenuItem(usize),
    MenuLink(usize),
    Listing,
    PageLink(String),
    PageButton(u32),
    Item { menu: usize, page: u32, index: usize },
    Field(String),
}

#[derive(Debug, Clone)]
pub struct MockSite {
    inner: Arc<MockInner>,
}

impl MockSite {
    pub fn new(menus: Vec<MockMenu>) -> Self {
        Self::build(menus, SiteSelectors::default(), false, false)
    }

    pub fn with_selectors(menus: Vec<MockMenu>, selectors: SiteSelectors) -> Self {
        Self::build(menus, selectors, false, false)
    }

    /// A page whose overlay popup must be dismissed first.
    pub fn with_popup(menus: Vec<MockMenu>) -> Self {
        Self::build(menus, SiteSelectors::default(), true, false)
    }

    /// A page whose menu lookups always error.
    pub fn broken(menus: Vec<MockMenu>) -> Self {
        Self::build(menus, SiteSelectors::default(), false, true)
    }

    fn build(
        menus: Vec<MockMenu>,
        selectors: SiteSelectors,
        popup: bool,
        fail_menu_lookup: bool,
    ) -> Self {
        let state = MockState {
            popup_present: popup,
            ..MockState::default()
        };
        Self {
            inner: Arc::new(MockInner {
                selectors,
                menus,
                fail_menu_lookup,
                state: Mutex::new(state),
            }),
        }
    }

    /// Underlying menu indices in activation order.
    pub fn activations(&self) -> Vec<usize> {
        self.inner.state().activations.clone()
    }

    /// Page numbers whose controls were clicked, in order.
    pub fn page_clicks(&self) -> Vec<u32> {
        self.inner.state().page_clicks.clone()
    }

    pub fn scrolls(&self) -> usize {
        self.inner.state().scrolls
    }

    pub fn popup_dismissed(&self) -> bool {
        self.inner.state().popup_dismissed
    }

    fn element(&self, node: Node) -> MockElement {
        MockElement {
            inner: self.inner.clone(),
            node,
        }
    }

    fn lookup(&self, selector: &str) -> Result<Vec<Node>> {
        let selectors = &self.inner.selectors;

        if selector == selectors.popup_close {
            let state = self.inner.state();
            let present = state.popup_present && !state.popup_dismissed;
            return Ok(if present { vec![Node::Popup] } else { vec![] });
        }

        if selector == selectors.menu_items {
            if self.inner.fail_menu_lookup {
                return Err(ScanError::Browser("menu container detached".to_string()));
            }
            return Ok((0..self.inner.menus.len()).map(Node::MenuItem).collect());
        }

        let Some((menu_index, menu, current_page)) = self.inner.active() else {
            return Ok(vec![]);
        };

        if selector == selectors.listing {
            return Ok(if menu.missing_listing {
                vec![]
            } else {
                vec![Node::Listing]
            });
        }

        if selector == selectors.pagination_links {
            let values = match &menu.page_values {
                Some(values) => values.clone(),
                None if menu.page_count() > 1 => {
                    (1..=menu.page_count()).map(|p| p.to_string()).collect()
                }
                None => vec![],
            };
            return Ok(values.into_iter().map(Node::PageLink).collect());
        }

        if selector == selectors.items {
            let items = usize::try_from(current_page)
                .ok()
                .and_then(|p| p.checked_sub(1))
                .and_then(|p| menu.pages.get(p))
                .map(Vec::len)
                .unwrap_or(0);
            return Ok((0..items)
                .map(|index| Node::Item {
                    menu: menu_index,
                    page: current_page,
                    index,
                })
                .collect());
        }

        for page in 1..=menu.page_count() {
            if selector == selectors.page_button_for(page) {
                return Ok(if menu.broken_pages.contains(&page) {
                    vec![]
                } else {
                    vec![Node::PageButton(page)]
                });
            }
        }

        Ok(vec![])
    }
}

#[async_trait]
impl RenderedPage for MockSite {
    type Element = MockElement;

    async fn find_all(&self, selector: &str) -> Result<Vec<MockElement>> {
        Ok(self
            .lookup(selector)?
            .into_iter()
            .map(|node| self.element(node))
            .collect())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.inner.state().scrolls += 1;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MockElement {
    inner: Arc<MockInner>,
    node: Node,
}

impl MockElement {
    fn item(&self) -> Option<&MockItem> {
        let Node::Item { menu, page, index } = self.node else {
            return None;
        };
        let page = usize::try_from(page).ok()?.checked_sub(1)?;
        self.inner.menus.get(menu)?.pages.get(page)?.get(index)
    }

    fn field(&self, selector: &str) -> Option<String> {
        let selectors = &self.inner.selectors;
        let item = self.item()?;
        if selector == selectors.brand_name {
            item.brand_name.clone()
        } else if selector == selectors.location {
            item.location.clone()
        } else if selector == selectors.category {
            item.category.clone()
        } else if selector == selectors.phone {
            item.phone.clone()
        } else {
            None
        }
    }

    fn menu(&self) -> Option<(usize, &MockMenu)> {
        match self.node {
            Node::MenuItem(index) | Node::MenuLink(index) => {
                self.inner.menus.get(index).map(|menu| (index, menu))
            }
            _ => None,
        }
    }
}

#[async_trait]
impl PageElement for MockElement {
    async fn find_all(&self, selector: &str) -> Result<Vec<Self>> {
        let node = match self.node {
            Node::MenuItem(index) if selector == self.inner.selectors.menu_link => {
                Some(Node::MenuLink(index))
            }
            Node::Item { .. } => self.field(selector).map(Node::Field),
            _ => None,
        };

        Ok(node
            .into_iter()
            .map(|node| MockElement {
                inner: self.inner.clone(),
                node,
            })
            .collect())
    }

    async fn text(&self) -> Result<String> {
        let text = match &self.node {
            Node::MenuItem(_) | Node::MenuLink(_) => {
                self.menu().map(|(_, menu)| menu.label.clone()).unwrap_or_default()
            }
            Node::Field(text) => text.clone(),
            Node::PageLink(value) => value.clone(),
            Node::PageButton(page) => page.to_string(),
            Node::Item { .. } => self
                .item()
                .and_then(|item| item.brand_name.clone())
                .unwrap_or_default(),
            Node::Popup | Node::Listing => String::new(),
        };
        Ok(text.trim().to_string())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        if name != self.inner.selectors.page_value_attribute {
            return Ok(None);
        }
        Ok(match &self.node {
            Node::PageLink(value) => Some(value.clone()),
            Node::PageButton(page) => Some(page.to_string()),
            _ => None,
        })
    }

    async fn is_visible(&self) -> Result<bool> {
        Ok(self
            .menu()
            .map(|(_, menu)| self.inner.is_menu_visible(menu))
            .unwrap_or(true))
    }

    async fn click(&self) -> Result<()> {
        match self.node {
            Node::MenuItem(_) | Node::MenuLink(_) => {
                let Some((index, menu)) = self.menu() else {
                    return Err(ScanError::ElementNotFound("menu".to_string()));
                };
                if menu.panic_on_activate {
                    panic!("renderer crashed while activating '{}'", menu.label);
                }
                if menu.fail_activation {
                    return Err(ScanError::Browser(format!(
                        "element '{}' is not clickable",
                        menu.label
                    )));
                }
                let mut state = self.inner.state();
                state.active_menu = Some(index);
                state.current_page = 1;
                state.activations.push(index);
            }
            Node::PageButton(page) => {
                let mut state = self.inner.state();
                state.current_page = page;
                state.page_clicks.push(page);
            }
            Node::Popup => self.inner.state().popup_dismissed = true,
            _ => {}
        }
        Ok(())
    }
}

/// Session over a [`MockSite`] that counts closes.
pub struct MockSession {
    site: MockSite,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for MockSession {
    type Page = MockSite;

    fn page(&self) -> &MockSite {
        &self.site
    }

    async fn close(self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out sessions over a shared [`MockSite`], or fails to launch.
pub struct MockLauncher {
    site: Option<MockSite>,
    launches: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl MockLauncher {
    pub fn new(site: MockSite) -> Self {
        Self {
            site: Some(site),
            launches: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A launcher whose sessions can never be established.
    pub fn unreachable() -> Self {
        Self {
            site: None,
            launches: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn launched_urls(&self) -> Vec<String> {
        self.launches
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionLauncher for MockLauncher {
    type Session = MockSession;

    async fn launch(&self, url: &str) -> Result<MockSession> {
        if let Ok(mut urls) = self.launches.lock() {
            urls.push(url.to_string());
        }
        let site = self
            .site
            .clone()
            .ok_or_else(|| ScanError::SessionInit(format!("{} is unreachable", url)))?;
        Ok(MockSession {
            site,
            closes: self.closes.clone(),
        })
    }
}
