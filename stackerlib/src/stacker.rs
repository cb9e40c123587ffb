//! Stacker instances and the registry of stacked tables.
//!
//! A [`Stacker`] owns everything that outlives a single `build` call: the
//! default options, the registry of built instances (source table, stacked
//! table and resolved options), and an optional [`WidthObserver`] whose
//! notifications flip visibility between the two tables.
//!
//! Visibility follows a class convention: whichever table of a pair carries
//! the `enabled` class is the one the stylesheet shows
//! (see [`style`](crate::style)).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use log::{debug, warn};

use crate::build::{
    build as build_stacked, ENABLED_CLASS, ORIGINAL_CLASS, SCOPE_ATTRIBUTE, STACKER_CLASS,
};
use crate::dom::{self, Handle};
use crate::observer::{MediaQuery, SubscriptionId, WidthObserver};
use crate::options::{OptionsOverride, StackerOptions};
use crate::table::Table;

/// Attribute holding per-table option overrides as JSON.
pub const OPTIONS_ATTRIBUTE: &str = "data-stacker-options";

/// Identifies one built instance within a [`Stacker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stacker-{}", self.0)
    }
}

/// A source table paired with its stacked rendition.
pub struct Instance {
    id: InstanceId,
    source: Handle,
    stacked: Handle,
    options: StackerOptions,
    row_count: usize,
    subscription: Option<SubscriptionId>,
}

impl Instance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// The original `<table>` element.
    pub fn source(&self) -> &Handle {
        &self.source
    }

    /// The generated `<table>` element.
    pub fn stacked(&self) -> &Handle {
        &self.stacked
    }

    /// Options as resolved for this table.
    pub fn options(&self) -> &StackerOptions {
        &self.options
    }

    /// Number of stacked rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// True when the stacked table is the visible one.
    pub fn is_enabled(&self) -> bool {
        dom::has_class(&self.stacked, ENABLED_CLASS)
    }

    fn owns(&self, target: &Handle) -> bool {
        std::rc::Rc::ptr_eq(&self.source, target)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("source_id", &dom::attr(&self.source, "id"))
            .field("options", &self.options)
            .field("row_count", &self.row_count)
            .field("subscription", &self.subscription)
            .finish()
    }
}

/// Show the stacked table and hide the source, or the reverse.
fn set_enabled(source: &Handle, stacked: &Handle, enabled: bool) {
    if enabled {
        dom::remove_class(source, ENABLED_CLASS);
        dom::add_class(stacked, ENABLED_CLASS);
    } else {
        dom::add_class(source, ENABLED_CLASS);
        dom::remove_class(stacked, ENABLED_CLASS);
    }
}

/// Operations reachable by name through [`Stacker::call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Merge options into the stacker defaults
    Defaults,
    /// Show the stacked tables
    Enable,
    /// Show the original tables
    Disable,
    /// Tear the instances down
    Detach,
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "defaults" => Ok(Method::Defaults),
            "enable" => Ok(Method::Enable),
            "disable" => Ok(Method::Disable),
            "detach" | "destroy" => Ok(Method::Detach),
            _ => Err(format!("Unknown stacker method: {}", s)),
        }
    }
}

/// A request through the single dispatch entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Stack the targets, optionally overriding options
    Build(Option<OptionsOverride>),
    /// Invoke a named method; unknown names do nothing
    Method(String, Option<OptionsOverride>),
}

impl Invocation {
    pub fn build() -> Self {
        Invocation::Build(None)
    }

    pub fn method(name: impl Into<String>) -> Self {
        Invocation::Method(name.into(), None)
    }
}

/// Hook run after each instance is built.
pub type BuildHook = Box<dyn FnMut(&Instance)>;

/// Builds stacked tables and tracks their visibility.
pub struct Stacker {
    defaults: StackerOptions,
    instances: BTreeMap<InstanceId, Instance>,
    next_id: u64,
    observer: Option<Box<dyn WidthObserver>>,
    on_build: Option<BuildHook>,
}

impl Default for Stacker {
    fn default() -> Self {
        Self::new()
    }
}

impl Stacker {
    /// A stacker with the built-in defaults.
    pub fn new() -> Self {
        Self::with_defaults(StackerOptions::default())
    }

    /// A stacker whose defaults start from `base`.
    pub fn with_defaults(base: StackerOptions) -> Self {
        Self {
            defaults: base,
            instances: BTreeMap::new(),
            next_id: 0,
            observer: None,
            on_build: None,
        }
    }

    /// Builder: drive visibility from `observer`.
    ///
    /// Without an observer, tables are built but visibility only changes
    /// through explicit [`enable`](Self::enable)/[`disable`](Self::disable).
    pub fn observe(mut self, observer: impl WidthObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Builder: run `hook` after every built instance.
    pub fn on_build(mut self, hook: impl FnMut(&Instance) + 'static) -> Self {
        self.on_build = Some(Box::new(hook));
        self
    }

    /// Current default options.
    pub fn defaults(&self) -> &StackerOptions {
        &self.defaults
    }

    /// Merge `overrides` into the defaults used by later builds.
    pub fn set_defaults(&mut self, overrides: &OptionsOverride) -> &mut Self {
        self.defaults.merge(overrides);
        self
    }

    /// Options for `target`: defaults, then the call override, then the
    /// element's own `data-stacker-options`.
    pub fn resolve_options(
        &self,
        target: &Handle,
        overrides: Option<&OptionsOverride>,
    ) -> StackerOptions {
        let mut options = self.defaults.clone();
        if let Some(overrides) = overrides {
            options.merge(overrides);
        }
        if let Some(json) = dom::attr(target, OPTIONS_ATTRIBUTE) {
            match OptionsOverride::from_json(&json) {
                Ok(element_overrides) => options.merge(&element_overrides),
                Err(e) => warn!("ignoring {} on table: {}", OPTIONS_ATTRIBUTE, e),
            }
        }
        options
    }

    /// Stack every table in `targets`.
    ///
    /// Each table gets `stacker stacker-original` added to its classes and its
    /// stacked rendition inserted as its next sibling. Targets that are not
    /// tables are skipped. Building the same table twice inserts a second
    /// stacked table; call [`detach`](Self::detach) first to rebuild.
    pub fn build(
        &mut self,
        targets: &[Handle],
        overrides: Option<&OptionsOverride>,
    ) -> Vec<InstanceId> {
        let mut built = Vec::new();

        for target in targets {
            let Some(table) = Table::read(target) else {
                debug!(
                    "skipping <{}>: not a table",
                    dom::element_name(target).unwrap_or_default()
                );
                continue;
            };

            let options = self.resolve_options(target, overrides);
            let stacked_table = build_stacked(&table, &options);
            let stacked = stacked_table.to_node();

            dom::add_class(target, &format!("{} {}", STACKER_CLASS, ORIGINAL_CLASS));
            if !dom::insert_after(target, stacked.clone()) {
                debug!("source table has no parent; stacked table left detached");
            }

            let id = InstanceId(self.next_id);
            self.next_id += 1;

            let subscription = self.observer.as_mut().map(|observer| {
                let query = MediaQuery::max_width(options.max_width);
                let (source, derived) = (target.clone(), stacked.clone());
                let subscription = observer.subscribe(
                    query,
                    Box::new(move |matched| set_enabled(&source, &derived, matched)),
                );
                set_enabled(target, &stacked, observer.matches(&query));
                subscription
            });

            debug!(
                "built {} for table {:?} ({} rows, max-width {})",
                id,
                table.id,
                stacked_table.row_count(),
                options.max_width
            );

            let instance = Instance {
                id,
                source: target.clone(),
                stacked,
                options,
                row_count: stacked_table.row_count(),
                subscription,
            };
            if let Some(hook) = self.on_build.as_mut() {
                hook(&instance);
            }
            self.instances.insert(id, instance);
            built.push(id);
        }

        built
    }

    /// Show the stacked tables of `targets`. Unbound targets are ignored.
    pub fn enable(&self, targets: &[Handle]) {
        self.toggle(targets, true);
    }

    /// Show the original tables of `targets`. Unbound targets are ignored.
    pub fn disable(&self, targets: &[Handle]) {
        self.toggle(targets, false);
    }

    fn toggle(&self, targets: &[Handle], enabled: bool) {
        for target in targets {
            let mut bound = false;
            for instance in self.instances.values().filter(|i| i.owns(target)) {
                set_enabled(&instance.source, &instance.stacked, enabled);
                bound = true;
            }
            if !bound {
                debug!("no stacker instance bound to target; ignoring");
            }
        }
    }

    /// Tear down the instances bound to `targets`.
    ///
    /// Unsubscribes from the observer, removes the stacked table from the
    /// document and strips the stacker classes from the source table.
    pub fn detach(&mut self, targets: &[Handle]) -> usize {
        let ids: Vec<InstanceId> = self
            .instances
            .values()
            .filter(|instance| targets.iter().any(|target| instance.owns(target)))
            .map(Instance::id)
            .collect();

        for id in &ids {
            if let Some(instance) = self.instances.remove(id) {
                self.teardown(instance);
            }
        }
        ids.len()
    }

    /// Tear down every instance.
    pub fn detach_all(&mut self) -> usize {
        let instances = std::mem::take(&mut self.instances);
        let count = instances.len();
        for instance in instances.into_values() {
            self.teardown(instance);
        }
        count
    }

    fn teardown(&mut self, instance: Instance) {
        if let (Some(observer), Some(subscription)) =
            (self.observer.as_mut(), instance.subscription)
        {
            observer.unsubscribe(subscription);
        }
        dom::detach(&instance.stacked);
        dom::remove_class(
            &instance.source,
            &format!("{} {} {}", STACKER_CLASS, ORIGINAL_CLASS, ENABLED_CLASS),
        );
        dom::remove_attr(&instance.source, SCOPE_ATTRIBUTE);
        debug!("detached {}", instance.id);
    }

    /// The first instance bound to `target`.
    pub fn instance(&self, target: &Handle) -> Option<&Instance> {
        self.instances.values().find(|instance| instance.owns(target))
    }

    /// All instances in build order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Single entry point: build, or invoke a method by name.
    ///
    /// Unknown method names leave everything untouched. The targets are
    /// returned for chaining.
    pub fn call<'t>(&mut self, targets: &'t [Handle], invocation: Invocation) -> &'t [Handle] {
        match invocation {
            Invocation::Build(overrides) => {
                self.build(targets, overrides.as_ref());
            }
            Invocation::Method(name, overrides) => match name.parse::<Method>() {
                Ok(Method::Defaults) => {
                    if let Some(overrides) = overrides {
                        self.set_defaults(&overrides);
                    }
                }
                Ok(Method::Enable) => self.enable(targets),
                Ok(Method::Disable) => self.disable(targets),
                Ok(Method::Detach) => {
                    self.detach(targets);
                }
                Err(e) => debug!("{}", e),
            },
        }
        targets
    }
}

impl fmt::Debug for Stacker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stacker")
            .field("defaults", &self.defaults)
            .field("instances", &self.instances.len())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::dom::Document;
    use crate::observer::Viewport;
    use crate::options::{Length, MaxWidth};

    const PRICES: &str = r#"<div id="wrap"><table id="prices" class="data">
        <thead><tr><th>Plan</th><th>Cost</th></tr></thead>
        <tbody><tr><td>Basic</td><td>$5</td></tr></tbody>
    </table></div>"#;

    fn prices() -> (Document, Handle) {
        let doc = Document::parse(PRICES);
        let table = doc.find_by_id("prices").unwrap();
        (doc, table)
    }

    #[test]
    fn test_build_inserts_sibling_and_marks_source() {
        let (doc, table) = prices();
        let mut stacker = Stacker::new();
        let ids = stacker.build(&[table.clone()], None);

        assert_eq!(ids.len(), 1);
        assert_eq!(stacker.len(), 1);
        assert_eq!(
            dom::classes(&table),
            vec!["data", "stacker", "stacker-original"]
        );

        let stacked = doc.find_by_id("stacker-prices").unwrap();
        let wrap = doc.find_by_id("wrap").unwrap();
        let siblings = dom::child_elements(&wrap);
        assert_eq!(siblings.len(), 2);
        assert!(Rc::ptr_eq(&siblings[1], &stacked));
        assert!(dom::inner_html(&stacked)
            .contains("<thead><tr><th>Plan</th><th>Basic</th></tr></thead>"));

        let instance = stacker.instance(&table).unwrap();
        assert_eq!(instance.row_count(), 1);
        assert!(Rc::ptr_eq(instance.stacked(), &stacked));
    }

    #[test]
    fn test_build_skips_non_tables() {
        let doc = Document::parse("<div id=\"x\"></div>");
        let div = doc.find_by_id("x").unwrap();
        let mut stacker = Stacker::new();
        assert!(stacker.build(&[div.clone()], None).is_empty());
        assert!(stacker.is_empty());
        assert_eq!(dom::attr(&div, "class"), None);
    }

    #[test]
    fn test_enable_disable_toggle_classes() {
        let (doc, table) = prices();
        let mut stacker = Stacker::new();
        stacker.build(&[table.clone()], None);
        let stacked = doc.find_by_id("stacker-prices").unwrap();

        stacker.enable(&[table.clone()]);
        assert!(!dom::has_class(&table, "enabled"));
        assert!(dom::has_class(&stacked, "enabled"));
        assert!(stacker.instance(&table).unwrap().is_enabled());

        stacker.disable(&[table.clone()]);
        assert!(dom::has_class(&table, "enabled"));
        assert!(!dom::has_class(&stacked, "enabled"));
    }

    #[test]
    fn test_enable_without_instance_is_noop() {
        let (doc, table) = prices();
        let before = doc.to_html();
        let stacker = Stacker::new();
        stacker.enable(&[table.clone()]);
        stacker.disable(&[table]);
        assert_eq!(doc.to_html(), before);
    }

    #[test]
    fn test_viewport_drives_visibility() {
        let (doc, table) = prices();
        let viewport = Viewport::new(1024.0);
        let mut stacker = Stacker::new().observe(viewport.clone());
        stacker.build(&[table.clone()], None);
        let stacked = doc.find_by_id("stacker-prices").unwrap();

        // evaluated once at build time
        assert!(dom::has_class(&table, "enabled"));
        assert!(!dom::has_class(&stacked, "enabled"));

        viewport.resize(600.0);
        assert!(!dom::has_class(&table, "enabled"));
        assert!(dom::has_class(&stacked, "enabled"));

        viewport.resize(1200.0);
        assert!(dom::has_class(&table, "enabled"));
        assert!(!dom::has_class(&stacked, "enabled"));
    }

    #[test]
    fn test_narrow_viewport_enables_at_build() {
        let (doc, table) = prices();
        let mut stacker = Stacker::new().observe(Viewport::new(320.0));
        stacker.build(&[table.clone()], None);
        let stacked = doc.find_by_id("stacker-prices").unwrap();
        assert!(dom::has_class(&stacked, "enabled"));
        assert!(!dom::has_class(&table, "enabled"));
    }

    #[test]
    fn test_element_options_take_precedence() {
        let doc = Document::parse(
            r#"<table id="t" class="data" data-stacker-options='{"customClass": "mine", "maxWidth": "20em"}'>
               <thead><tr><th>A</th></tr></thead><tbody><tr><td>1</td></tr></tbody></table>"#,
        );
        let table = doc.find_by_id("t").unwrap();
        let mut stacker = Stacker::with_defaults(StackerOptions::new().preserve_classes(true));
        stacker.set_defaults(&OptionsOverride::new().custom_class("global"));

        let call = OptionsOverride::new().custom_class("call");
        stacker.build(&[table.clone()], Some(&call));

        let instance = stacker.instance(&table).unwrap();
        assert_eq!(instance.options().custom_class, "mine");
        assert!(instance.options().preserve_classes);
        assert_eq!(
            instance.options().max_width,
            MaxWidth::Length(Length::em(20.0))
        );

        let stacked = doc.find_by_id("stacker-t").unwrap();
        assert_eq!(
            dom::attr(&stacked, "class").as_deref(),
            Some("stacker stacker-table mine data")
        );
    }

    #[test]
    fn test_malformed_element_options_are_ignored() {
        let doc = Document::parse(
            r#"<table id="t" data-stacker-options="{not json"><tr><td>A</td></tr></table>"#,
        );
        let table = doc.find_by_id("t").unwrap();
        let mut stacker = Stacker::new();
        stacker.set_defaults(&OptionsOverride::new().custom_class("global"));
        stacker.build(&[table.clone()], None);
        assert_eq!(stacker.instance(&table).unwrap().options().custom_class, "global");
    }

    #[test]
    fn test_building_twice_adds_two_siblings() {
        let (doc, table) = prices();
        let mut stacker = Stacker::new();
        stacker.build(&[table.clone()], None);
        stacker.build(&[table.clone()], None);

        let wrap = doc.find_by_id("wrap").unwrap();
        assert_eq!(dom::child_elements(&wrap).len(), 3);
        assert_eq!(stacker.len(), 2);

        assert_eq!(stacker.detach(&[table.clone()]), 2);
        assert_eq!(dom::child_elements(&wrap).len(), 1);
    }

    #[test]
    fn test_detach_restores_source_and_unsubscribes() {
        let (doc, table) = prices();
        let viewport = Viewport::new(500.0);
        let mut stacker = Stacker::new().observe(viewport.clone());
        stacker.build(&[table.clone()], None);
        assert_eq!(viewport.subscription_count(), 1);

        assert_eq!(stacker.detach(&[table.clone()]), 1);
        assert!(stacker.is_empty());
        assert_eq!(viewport.subscription_count(), 0);
        assert!(doc.find_by_id("stacker-prices").is_none());
        assert_eq!(dom::classes(&table), vec!["data"]);

        viewport.resize(1000.0);
        assert_eq!(dom::classes(&table), vec!["data"]);
    }

    #[test]
    fn test_detach_all() {
        let doc = Document::parse(
            "<table id=\"a\"><tr><td>x</td></tr></table><table id=\"b\"><tr><td>y</td></tr></table>",
        );
        let mut stacker = Stacker::new();
        stacker.build(&doc.tables(), None);
        assert_eq!(stacker.len(), 2);
        assert_eq!(stacker.detach_all(), 2);
        assert!(doc.find_by_id("stacker-a").is_none());
        assert!(doc.find_by_id("stacker-b").is_none());
    }

    #[test]
    fn test_on_build_hook() {
        let (_doc, table) = prices();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut stacker =
            Stacker::new().on_build(move |instance| sink.borrow_mut().push(instance.row_count()));
        stacker.build(&[table], None);
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn test_call_dispatch() {
        let (doc, table) = prices();
        let targets = vec![table.clone()];
        let mut stacker = Stacker::new();

        let returned = stacker.call(
            &targets,
            Invocation::Method(
                "defaults".to_string(),
                Some(OptionsOverride::new().custom_class("wide")),
            ),
        );
        assert_eq!(returned.len(), 1);
        assert_eq!(stacker.defaults().custom_class, "wide");

        stacker.call(&targets, Invocation::build());
        let stacked = doc.find_by_id("stacker-prices").unwrap();
        assert!(dom::has_class(&stacked, "wide"));

        stacker.call(&targets, Invocation::method("enable"));
        assert!(dom::has_class(&stacked, "enabled"));

        let before = doc.to_html();
        let returned = stacker.call(&targets, Invocation::method("explode"));
        assert!(Rc::ptr_eq(&returned[0], &table));
        assert_eq!(doc.to_html(), before);

        stacker.call(&targets, Invocation::method("disable"));
        assert!(!dom::has_class(&stacked, "enabled"));

        stacker.call(&targets, Invocation::method("destroy"));
        assert!(stacker.is_empty());
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("defaults".parse::<Method>().unwrap(), Method::Defaults);
        assert_eq!("enable".parse::<Method>().unwrap(), Method::Enable);
        assert_eq!("disable".parse::<Method>().unwrap(), Method::Disable);
        assert_eq!("detach".parse::<Method>().unwrap(), Method::Detach);
        assert!("Enable".parse::<Method>().is_err());
    }
}
