use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const MAX_DELAY_SLIDER: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Clip {
    /// File name inside the battle folder; doubles as the vote entry id.
    pub id: String,
    pub author: String,
    pub title: String,
    pub path: PathBuf,
    /// Author notes read from a `.txt` file next to the clip.
    #[serde(default)]
    pub notes: Option<String>,
}

impl Clip {
    pub fn label(&self) -> String {
        match (self.author.is_empty(), self.title.is_empty()) {
            (false, false) => format!("{} - {}", self.author, self.title),
            (true, false) => self.title.clone(),
            (false, true) => self.author.clone(),
            (true, true) => self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Battle {
    pub name: String,
    pub clips: Vec<Clip>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
    #[serde(default = "default_delay_slider")]
    pub delay_slider: u32,
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub show_notes: bool,
    #[serde(default)]
    pub shuffle_seed: Option<String>,
    #[serde(default)]
    pub last_battle: Option<String>,
    #[serde(default)]
    pub output_device: Option<String>,
}

fn default_autoplay() -> bool {
    true
}

fn default_delay_slider() -> u32 {
    1
}

fn default_server_url() -> String {
    String::from("http://127.0.0.1:8080")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autoplay: default_autoplay(),
            delay_slider: default_delay_slider(),
            server_url: default_server_url(),
            show_notes: false,
            shuffle_seed: None,
            last_battle: None,
            output_device: None,
        }
    }
}
