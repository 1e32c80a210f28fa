use learnhub_ai::{
    AssistantClient, AssistantConfig, ChatClient, ChatConfig, VectorFileConfig, VectorFileManager,
};
use learnhub_core::Settings;
use learnhub_rules::RulesStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub rules: Arc<RulesStore>,
    pub chat: ChatClient,
    /// Absent when no assistant id is configured; chat requests then use
    /// plain completions.
    pub assistant: Option<AssistantClient>,
    pub files: VectorFileManager,
}

impl AppState {
    pub fn new(settings: Settings) -> learnhub_core::Result<Self> {
        let rules = Arc::new(RulesStore::new(settings.rules_path.clone()));
        let chat = ChatClient::new(ChatConfig::from_settings(&settings))?;
        let assistant = AssistantConfig::from_settings(&settings)
            .map(AssistantClient::new)
            .transpose()?;
        let files = VectorFileManager::new(VectorFileConfig::from_settings(&settings))?;

        Ok(Self {
            settings: Arc::new(settings),
            rules,
            chat,
            assistant,
            files,
        })
    }
}
