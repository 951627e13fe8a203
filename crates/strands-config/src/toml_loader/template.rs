//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Strands Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[model]
# provider = "bedrock"   # bedrock, claude, scripted
# model_id = "global.anthropic.claude-sonnet-4-5-20250929-v1:0"
# region = "us-east-1"   # bedrock only
# max_tokens = 4096      # 1-65536
# temperature = 0.1      # 0.0-1.0
# system_prompt = "You are a helpful assistant. Be concise and friendly."
# cache_system_prompt = false
# cache_documents = false   # cache point after each attached document

[agent]
# max_tool_rounds = 8    # 1-64
# tools = ["calculator", "current_time"]

[retry]
# max_attempts = 3       # 1-10, first attempt included
# base_delay_ms = 500
# max_delay_ms = 8000
# request_timeout_secs = 120  # 1-900

[logging]
# level = "info"         # trace, debug, info, warn, error
"##
    .to_string()
}
