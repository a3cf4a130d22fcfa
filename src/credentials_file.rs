//! Plaintext credentials file consumed by the downstream game client.

use std::path::PathBuf;

use jx_auth::Character;

/// Render the key-value credentials file body.
///
/// The refresh and access token slots are intentionally left blank; the
/// client only needs the character, session, and display name.
pub fn render(character: &Character, session_id: &str) -> String {
    format!(
        "JX_CHARACTER_ID={}\nJX_SESSION_ID={}\nJX_REFRESH_TOKEN=\nJX_DISPLAY_NAME={}\nJX_ACCESS_TOKEN=\n",
        character.account_id, session_id, character.display_name
    )
}

/// Expand a leading `~` or `$HOME` in the output destination.
pub fn expand_destination(destination: &str) -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_default();
    if let Some(rest) = destination.strip_prefix("~/") {
        return PathBuf::from(home).join(rest);
    }
    if let Some(rest) = destination.strip_prefix("$HOME/") {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_layout() {
        let character = Character {
            account_id: "acct-1".to_string(),
            display_name: "Zezima".to_string(),
            user_hash: "hash".to_string(),
        };

        let body = render(&character, "session-1");
        assert_eq!(
            body,
            "JX_CHARACTER_ID=acct-1\nJX_SESSION_ID=session-1\nJX_REFRESH_TOKEN=\nJX_DISPLAY_NAME=Zezima\nJX_ACCESS_TOKEN=\n"
        );
    }

    #[test]
    fn test_expand_destination_home_forms() {
        let home = std::env::var("HOME").unwrap_or_default();
        assert_eq!(
            expand_destination("~/x/y"),
            PathBuf::from(&home).join("x/y")
        );
        assert_eq!(
            expand_destination("$HOME/x"),
            PathBuf::from(&home).join("x")
        );
        assert_eq!(expand_destination("/abs/path"), PathBuf::from("/abs/path"));
    }
}
