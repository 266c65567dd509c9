use anyhow::{Context, Result};

use crate::core::script::Script;
use crate::services::llm::LlmClient;

// The schema block is quoted to the model exactly as written; it reliably
// keeps ids numeric and dialogue an array.
pub const SYSTEM_PROMPT: &str = r"
你是一位專業的漫畫編劇和分鏡師。
任務：根據使用者的主題、風格和格數，產生一個結構化的漫畫劇本 JSON。

輸出規則：
1. 僅回傳純 JSON 陣列 (Array)，不要包含 markdown 標記。
2. 語言：繁體中文。
3. JSON 結構：
   interface ComicPanelData {
     id: number;
     act: string;
     title: string;
     visualDescription: string;
     dialogue: { character: string; text: string; }[];
     techNote?: string;
   }
";

pub struct ScriptRequest {
    pub topic: String,
    pub style_label: String,
    pub panel_count: u32,
}

pub fn build_user_prompt(request: &ScriptRequest) -> String {
    format!(
        "主題：{}\n風格：{}\n格數：{}",
        request.topic, request.style_label, request.panel_count
    )
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json")
            .trim_end_matches("```")
            .trim()
            .to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
            .to_string()
    } else {
        s.to_string()
    }
}

pub async fn write_script(llm: &dyn LlmClient, request: &ScriptRequest) -> Result<Script> {
    log::info!(
        "Drafting a {}-panel script about {:?}",
        request.panel_count,
        request.topic
    );

    let response = llm.chat(SYSTEM_PROMPT, &build_user_prompt(request)).await?;

    // Clean markdown code blocks if present
    let clean_json = strip_code_blocks(&response);
    let script = Script::parse(&clean_json)
        .context(format!("Failed to parse script JSON: {}", clean_json))?;

    if script.len() != request.panel_count as usize {
        log::warn!(
            "Asked for {} panels but the draft has {}",
            request.panel_count,
            script.len()
        );
    }

    Ok(script)
}
