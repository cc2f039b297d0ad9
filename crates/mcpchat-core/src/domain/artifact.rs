//! Artifacts - tools, resources, and prompts exposed by an endpoint

use serde::{Deserialize, Serialize};

/// Kind of artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Tool that can be invoked
    Tool,
    /// Resource that can be read
    Resource,
    /// Prompt template
    Prompt,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Resource => "resource",
            Self::Prompt => "prompt",
        }
    }
}

/// Identity of an artifact within one endpoint's collection
///
/// Tools and prompts are keyed by name, resources by URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ArtifactId {
    pub kind: ArtifactKind,
    pub key: String,
}

impl ArtifactId {
    pub fn new(kind: ArtifactKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.key)
    }
}

/// A callable tool and its input schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolArtifact {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the tool arguments
    #[serde(default)]
    pub input_schema: serde_json::Value,
}

impl ToolArtifact {
    pub fn new(name: impl Into<String>, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A readable resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceArtifact {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceArtifact {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: None,
            description: None,
            mime_type: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// One declared prompt argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A prompt template and its argument schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptArtifact {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

impl PromptArtifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, required: bool) -> Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            description: None,
            required,
        });
        self
    }
}

/// Borrowed view over any artifact kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Artifact<'a> {
    Tool(&'a ToolArtifact),
    Resource(&'a ResourceArtifact),
    Prompt(&'a PromptArtifact),
}

impl Artifact<'_> {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Tool(_) => ArtifactKind::Tool,
            Self::Resource(_) => ArtifactKind::Resource,
            Self::Prompt(_) => ArtifactKind::Prompt,
        }
    }

    pub fn id(&self) -> ArtifactId {
        match self {
            Self::Tool(t) => ArtifactId::new(ArtifactKind::Tool, &t.name),
            Self::Resource(r) => ArtifactId::new(ArtifactKind::Resource, &r.uri),
            Self::Prompt(p) => ArtifactId::new(ArtifactKind::Prompt, &p.name),
        }
    }
}

/// Snapshot of everything one endpoint exposes at one point in time
///
/// Value type: a refresh replaces the whole collection, nothing edits it in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactCollection {
    pub tools: Vec<ToolArtifact>,
    pub resources: Vec<ResourceArtifact>,
    pub prompts: Vec<PromptArtifact>,
}

impl ArtifactCollection {
    /// Create empty collection
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_count(&self) -> usize {
        self.tools.len() + self.resources.len() + self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Iterate over every artifact, tools first, then resources, then prompts
    pub fn iter(&self) -> impl Iterator<Item = Artifact<'_>> {
        self.tools
            .iter()
            .map(Artifact::Tool)
            .chain(self.resources.iter().map(Artifact::Resource))
            .chain(self.prompts.iter().map(Artifact::Prompt))
    }

    pub fn count_of(&self, kind: ArtifactKind) -> usize {
        match kind {
            ArtifactKind::Tool => self.tools.len(),
            ArtifactKind::Resource => self.resources.len(),
            ArtifactKind::Prompt => self.prompts.len(),
        }
    }
}

/// Identity-level difference between two collections of one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactDiff {
    pub added: Vec<ArtifactId>,
    pub removed: Vec<ArtifactId>,
    /// Same identity, different schema or metadata
    pub modified: Vec<ArtifactId>,
}

impl ArtifactDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Whether any artifact of `kind` was added, removed, or modified
    pub fn touches(&self, kind: ArtifactKind) -> bool {
        self.added
            .iter()
            .chain(&self.removed)
            .chain(&self.modified)
            .any(|id| id.kind == kind)
    }
}
