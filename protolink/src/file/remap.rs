use std::borrow::Cow;

/// A single rewrite rule of an [`ImportRemapper`].
///
/// # Examples
///
/// ```
/// # use protolink::file::RemapRule;
/// let rule = RemapRule::prefix("third_party/", "vendor/").for_importer("api/service.proto");
/// assert_eq!(rule.apply("api/service.proto", "third_party/foo.proto").as_deref(), Some("vendor/foo.proto"));
/// assert_eq!(rule.apply("other.proto", "third_party/foo.proto"), None);
///
/// let rule = RemapRule::exact("common.proto", "api/common.proto").for_importer_prefix("api/");
/// assert_eq!(rule.apply("api/v1/service.proto", "common.proto").as_deref(), Some("api/common.proto"));
/// assert_eq!(rule.apply("web/page.proto", "common.proto"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapRule {
    importer: Option<Importer>,
    from: String,
    to: String,
    prefix: bool,
}

impl RemapRule {
    /// A rule which replaces the import path `from` with `to`.
    pub fn exact(from: impl Into<String>, to: impl Into<String>) -> Self {
        RemapRule {
            importer: None,
            from: from.into(),
            to: to.into(),
            prefix: false,
        }
    }

    /// A rule which replaces the leading `from` of an import path with `to`.
    pub fn prefix(from: impl Into<String>, to: impl Into<String>) -> Self {
        RemapRule {
            importer: None,
            from: from.into(),
            to: to.into(),
            prefix: true,
        }
    }

    /// Restricts this rule to imports made by the file with the given name.
    pub fn for_importer(mut self, importer: impl Into<String>) -> Self {
        self.importer = Some(Importer::File(importer.into()));
        self
    }

    /// Restricts this rule to imports made by files whose name starts with `prefix`.
    pub fn for_importer_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.importer = Some(Importer::Prefix(prefix.into()));
        self
    }

    /// Returns the rewritten import path, or `None` if this rule does not match.
    pub fn apply(&self, importer: &str, import: &str) -> Option<String> {
        match &self.importer {
            Some(Importer::File(expected)) if expected != importer => return None,
            Some(Importer::Prefix(prefix)) if !importer.starts_with(prefix.as_str()) => {
                return None
            }
            _ => (),
        }

        if self.prefix {
            import
                .strip_prefix(self.from.as_str())
                .map(|rest| format!("{}{}", self.to, rest))
        } else if import == self.from {
            Some(self.to.clone())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Importer {
    File(String),
    Prefix(String),
}

/// A prioritised list of rules for rewriting import paths before they are resolved.
///
/// Rules are tried in the order they were added, and the first match wins. An import which
/// matches no rule is left unchanged.
///
/// # Examples
///
/// ```
/// # use protolink::file::{ImportRemapper, RemapRule};
/// let remapper = ImportRemapper::new()
///     .with_rule(RemapRule::exact("old.proto", "new.proto").for_importer("a.proto"))
///     .with_rule(RemapRule::prefix("old", "legacy/old"));
///
/// assert_eq!(remapper.remap("a.proto", "old.proto"), "new.proto");
/// assert_eq!(remapper.remap("b.proto", "old.proto"), "legacy/old.proto");
/// assert_eq!(remapper.remap("b.proto", "other.proto"), "other.proto");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRemapper {
    rules: Vec<RemapRule>,
}

impl ImportRemapper {
    /// Creates a remapper with no rules.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds a rule with lower priority than every rule added before it.
    pub fn with_rule(mut self, rule: RemapRule) -> Self {
        self.add_rule(rule);
        self
    }

    /// Adds a rule with lower priority than every rule added before it.
    pub fn add_rule(&mut self, rule: RemapRule) {
        self.rules.push(rule);
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rewrites an import of `import` made by the file `importer`.
    pub fn remap<'a>(&self, importer: &str, import: &'a str) -> Cow<'a, str> {
        match self
            .rules
            .iter()
            .find_map(|rule| rule.apply(importer, import))
        {
            Some(remapped) => {
                log::trace!(
                    "remapped import '{}' of file '{}' to '{}'",
                    import,
                    importer,
                    remapped
                );
                Cow::Owned(remapped)
            }
            None => Cow::Borrowed(import),
        }
    }
}
