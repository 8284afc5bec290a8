use serde::Deserialize;
use std::path::Path;

pub const SETTINGS_FILE: &str = "attendanced.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub school_name: String,
    pub roll_prefix: String,
    pub admin_emails: Vec<String>,
    pub require_email_confirmation: bool,
    pub min_password_length: usize,
    pub export_scale: u32,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            school_name: "Aljamea Business School".to_string(),
            roll_prefix: "ALJ-".to_string(),
            admin_emails: Vec::new(),
            require_email_confirmation: true,
            min_password_length: 6,
            export_scale: 2,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then `<workspace>/attendanced.toml` when present, then
    /// `ATTENDANCED_*` environment variables.
    pub fn load(workspace: Option<&Path>) -> anyhow::Result<Self> {
        let d = Settings::default();
        let mut builder = config::Config::builder()
            .set_default("school_name", d.school_name)?
            .set_default("roll_prefix", d.roll_prefix)?
            .set_default("admin_emails", Vec::<String>::new())?
            .set_default("require_email_confirmation", d.require_email_confirmation)?
            .set_default("min_password_length", d.min_password_length as i64)?
            .set_default("export_scale", d.export_scale as i64)?
            .set_default("log_level", d.log_level)?;
        if let Some(ws) = workspace {
            builder = builder.add_source(config::File::from(ws.join(SETTINGS_FILE)).required(false));
        }
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix("ATTENDANCED")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("admin_emails"),
            )
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.roll_prefix.trim().is_empty() {
            anyhow::bail!("roll_prefix must not be empty");
        }
        if !(1..=8).contains(&self.export_scale) {
            anyhow::bail!("export_scale must be between 1 and 8");
        }
        Ok(())
    }

    pub fn is_bootstrap_admin(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(email.trim()))
    }
}
