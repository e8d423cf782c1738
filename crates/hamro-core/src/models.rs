#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
}

pub const AVAILABLE_MODELS: &[ModelDescriptor] = &[
    ModelDescriptor {
        id: "gemini-3-flash-preview",
        display_name: "Gemini 3.0 Flash",
        description: "Fast, perfect for writing.",
    },
    ModelDescriptor {
        id: "gemini-3-pro-preview",
        display_name: "Gemini 3.0 Pro",
        description: "Advanced reasoning & coding.",
    },
];

/// Summaries always go to the fast model, whatever the chat uses.
pub const SUMMARY_MODEL: &str = "gemini-3-flash-preview";

impl ModelDescriptor {
    pub fn all() -> &'static [ModelDescriptor] {
        AVAILABLE_MODELS
    }

    pub fn default_model() -> &'static ModelDescriptor {
        &AVAILABLE_MODELS[0]
    }

    pub fn find(id: &str) -> Option<&'static ModelDescriptor> {
        AVAILABLE_MODELS.iter().find(|m| m.id == id)
    }
}

/// Display name for a model id, falling back to the raw id for models
/// outside the catalog.
pub fn display_name(id: &str) -> &str {
    ModelDescriptor::find(id)
        .map(|m| m.display_name)
        .unwrap_or(id)
}
