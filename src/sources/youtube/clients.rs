//! InnerTube client profiles (§4.2, §B). Consolidates the teacher's
//! `sources/youtube/clients/{android,ios,web,music_android}.rs` — one
//! context-builder per persona — into a single enum-driven module. Reduced
//! from the teacher's nine profiles to four representative ones, enough to
//! demonstrate the fallback-and-restore mechanics §4.2 requires.

use serde_json::{Value, json};

pub const INNERTUBE_API: &str = "https://youtubei.googleapis.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientProfile {
    Android,
    Ios,
    Web,
    Music,
}

impl ClientProfile {
    /// Fallback order used by the Extractor Registry (§4.2): Android first
    /// (most permissive playability), then iOS, Web (needed for playlists),
    /// Music last (only relevant for `music.*` URLs).
    pub const FALLBACK_ORDER: [ClientProfile; 4] = [
        ClientProfile::Android,
        ClientProfile::Ios,
        ClientProfile::Web,
        ClientProfile::Music,
    ];

    pub fn client_name(self) -> &'static str {
        match self {
            ClientProfile::Android => "ANDROID",
            ClientProfile::Ios => "IOS",
            ClientProfile::Web => "WEB",
            ClientProfile::Music => "WEB_REMIX",
        }
    }

    pub fn client_id(self) -> &'static str {
        match self {
            ClientProfile::Android => "3",
            ClientProfile::Ios => "5",
            ClientProfile::Web => "1",
            ClientProfile::Music => "67",
        }
    }

    pub fn client_version(self) -> &'static str {
        match self {
            ClientProfile::Android => "20.01.35",
            ClientProfile::Ios => "21.02.1",
            ClientProfile::Web => "2.20250101.00.00",
            ClientProfile::Music => "1.20250101.01.00",
        }
    }

    pub fn user_agent(self) -> &'static str {
        match self {
            ClientProfile::Android => {
                "com.google.android.youtube/20.01.35 (Linux; U; Android 14) identity"
            }
            ClientProfile::Ios => {
                "com.google.ios.youtube/21.02.1 (iPhone16,2; U; CPU iOS 18_2 like Mac OS X;)"
            }
            ClientProfile::Web | ClientProfile::Music => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
            }
        }
    }

    /// Builds the InnerTube `context` object this profile sends on every
    /// request.
    pub fn build_context(self) -> Value {
        let client = match self {
            ClientProfile::Android => json!({
                "clientName": self.client_name(),
                "clientVersion": self.client_version(),
                "userAgent": self.user_agent(),
                "deviceMake": "Google",
                "deviceModel": "Pixel 8",
                "osName": "Android",
                "osVersion": "14",
                "androidSdkVersion": "34",
                "hl": "en",
                "gl": "US",
            }),
            ClientProfile::Ios => json!({
                "clientName": self.client_name(),
                "clientVersion": self.client_version(),
                "userAgent": self.user_agent(),
                "deviceMake": "Apple",
                "deviceModel": "iPhone16,2",
                "osName": "iOS",
                "osVersion": "18.2.0.22C152",
                "hl": "en",
                "gl": "US",
            }),
            ClientProfile::Web | ClientProfile::Music => json!({
                "clientName": self.client_name(),
                "clientVersion": self.client_version(),
                "userAgent": self.user_agent(),
                "hl": "en",
                "gl": "US",
            }),
        };

        json!({
            "client": client,
            "user": { "lockedSafetyMode": false },
            "request": { "useSsl": true },
        })
    }

    pub fn player_endpoint(self) -> String {
        format!("{INNERTUBE_API}/youtubei/v1/player?prettyPrint=false")
    }

    pub fn next_endpoint(self) -> String {
        format!("{INNERTUBE_API}/youtubei/v1/next?prettyPrint=false")
    }

    pub fn browse_endpoint(self) -> String {
        format!("{INNERTUBE_API}/youtubei/v1/browse?prettyPrint=false")
    }
}

/// Process-wide "current client profile" slot (§4.2, §9 REDESIGN FLAGS):
/// legacy call sites read this via [`current`], but new code should prefer
/// threading a `ClientProfile` explicitly and only touch this through
/// [`with_profile`]'s scoped swap-and-restore.
static CURRENT: std::sync::RwLock<ClientProfile> = std::sync::RwLock::new(ClientProfile::Android);

pub fn current() -> ClientProfile {
    *CURRENT.read().unwrap_or_else(|e| e.into_inner())
}

/// Runs `f` with the process-wide default client profile temporarily set to
/// `profile`, restoring the previous value afterward even if `f` returns an
/// error (§4.2: "current client profile" is swapped for the duration of an
/// extractor call and restored on exit).
pub async fn with_profile<F, Fut, T>(profile: ClientProfile, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    let previous = {
        let mut guard = CURRENT.write().unwrap_or_else(|e| e.into_inner());
        let previous = *guard;
        *guard = profile;
        previous
    };
    let result = f().await;
    let mut guard = CURRENT.write().unwrap_or_else(|e| e.into_inner());
    *guard = previous;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_profile_restores_previous_on_return() {
        assert_eq!(current(), ClientProfile::Android);
        with_profile(ClientProfile::Ios, || async {
            assert_eq!(current(), ClientProfile::Ios);
        })
        .await;
        assert_eq!(current(), ClientProfile::Android);
    }
}
