//! The per-run credential set.

use super::{CredentialCollector, FieldSpec, PromptError, Prompter, SecretString, Validator};
use crate::config::ProvisionConfig;

/// Application database account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseCredentials {
    /// Database user name.
    pub user: String,
    /// Database password.
    pub password: SecretString,
}

/// Asterisk Manager Interface account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmiCredentials {
    /// AMI user name.
    pub user: String,
    /// AMI secret.
    pub secret: SecretString,
}

/// The administrative account of the web application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminProfile {
    /// Login email, also the lookup key.
    pub email: String,
    /// Web login password.
    pub password: SecretString,
    /// Numeric passcode for the IVR.
    pub ivr_passcode: SecretString,
    /// Phone number the IVR recognizes.
    pub phone_number: String,
}

/// SMS provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingCredentials {
    /// Account SID.
    pub account_sid: String,
    /// Auth token.
    pub auth_token: SecretString,
    /// Sender number in E.164 form.
    pub phone_number: String,
    /// Messaging service SID, when sending through a service.
    pub messaging_service_sid: Option<String>,
}

/// Defaults and limits that shape the credential prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDefaults {
    /// Suggested database user.
    pub db_user: String,
    /// Suggested AMI user.
    pub ami_user: String,
    /// Suggested IVR extension.
    pub ivr_extension: String,
    /// Number of digits in the IVR passcode.
    pub passcode_digits: usize,
    /// Minimum password and secret length.
    pub min_secret_len: usize,
}

impl Default for CredentialDefaults {
    fn default() -> Self {
        Self {
            db_user: "infocall".to_string(),
            ami_user: "infocall".to_string(),
            ivr_extension: "7777".to_string(),
            passcode_digits: 4,
            min_secret_len: 8,
        }
    }
}

impl CredentialDefaults {
    /// Derives the defaults from the configuration.
    #[must_use]
    pub fn from_config(config: &ProvisionConfig) -> Self {
        Self {
            db_user: config.database.app_user.clone(),
            ami_user: config.telephony.ami_user.clone(),
            ivr_extension: config.telephony.ivr_extension.clone(),
            passcode_digits: config.admin.passcode_digits,
            min_secret_len: config.admin.min_secret_len,
        }
    }
}

/// Credentials collected during one run.
///
/// Each group is collected on first use and reused by later stages of the
/// same run. Nothing here is ever persisted.
#[derive(Debug, Default)]
pub struct CredentialSet {
    defaults: CredentialDefaults,
    database: Option<DatabaseCredentials>,
    ami: Option<AmiCredentials>,
    admin: Option<AdminProfile>,
    messaging: Option<MessagingCredentials>,
    ivr_extension: Option<String>,
}

impl CredentialSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new(defaults: CredentialDefaults) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// Returns the database credentials, prompting on first use.
    pub fn database(&mut self, prompter: &mut dyn Prompter) -> Result<DatabaseCredentials, PromptError> {
        if let Some(existing) = &self.database {
            return Ok(existing.clone());
        }
        let mut collector = CredentialCollector::new(prompter);
        collector.notify("Database account for the InfoCall application.");
        let user = collector.collect(
            &FieldSpec::new("db_user", "Database user", Validator::Identifier)
                .with_default(&self.defaults.db_user),
        )?;
        let password = collector.collect_secret(
            &FieldSpec::new(
                "db_password",
                "Database password",
                Validator::Password {
                    min_len: self.defaults.min_secret_len,
                },
            )
            .secret()
            .confirmed(),
        )?;
        let creds = DatabaseCredentials { user, password };
        self.database = Some(creds.clone());
        Ok(creds)
    }

    /// Discards collected database credentials so the next use prompts again.
    pub fn forget_database(&mut self) {
        self.database = None;
    }

    /// Returns the AMI credentials, prompting on first use.
    pub fn ami(&mut self, prompter: &mut dyn Prompter) -> Result<AmiCredentials, PromptError> {
        if let Some(existing) = &self.ami {
            return Ok(existing.clone());
        }
        let mut collector = CredentialCollector::new(prompter);
        collector.notify("Asterisk Manager Interface account.");
        let user = collector.collect(
            &FieldSpec::new("ami_user", "AMI user", Validator::Identifier)
                .with_default(&self.defaults.ami_user),
        )?;
        let secret = collector.collect_secret(
            &FieldSpec::new(
                "ami_secret",
                "AMI secret",
                Validator::ConfigToken {
                    min_len: self.defaults.min_secret_len,
                },
            )
            .secret()
            .confirmed(),
        )?;
        let creds = AmiCredentials { user, secret };
        self.ami = Some(creds.clone());
        Ok(creds)
    }

    /// Returns the administrator profile, prompting on first use.
    pub fn admin(&mut self, prompter: &mut dyn Prompter) -> Result<AdminProfile, PromptError> {
        if let Some(existing) = &self.admin {
            return Ok(existing.clone());
        }
        let mut collector = CredentialCollector::new(prompter);
        collector.notify("Administrator account for the web interface and IVR.");
        let email = collector.collect(&FieldSpec::new("admin_email", "Admin email", Validator::Email))?;
        let password = collector.collect_secret(
            &FieldSpec::new(
                "admin_password",
                "Admin password",
                Validator::Password {
                    min_len: self.defaults.min_secret_len,
                },
            )
            .secret()
            .confirmed(),
        )?;
        let ivr_passcode = collector.collect_secret(
            &FieldSpec::new(
                "admin_ivr_passcode",
                "Admin IVR passcode",
                Validator::ExactDigits(self.defaults.passcode_digits),
            )
            .secret()
            .confirmed(),
        )?;
        let phone_number = collector.collect(&FieldSpec::new(
            "admin_phone",
            "Admin phone number",
            Validator::PhoneNumber,
        ))?;
        let profile = AdminProfile {
            email,
            password,
            ivr_passcode,
            phone_number,
        };
        self.admin = Some(profile.clone());
        Ok(profile)
    }

    /// Returns the messaging credentials, prompting on first use.
    pub fn messaging(&mut self, prompter: &mut dyn Prompter) -> Result<MessagingCredentials, PromptError> {
        if let Some(existing) = &self.messaging {
            return Ok(existing.clone());
        }
        let account_sid_rule = Validator::pattern(
            r"^AC[0-9a-fA-F]{32}$",
            "must be 'AC' followed by 32 hexadecimal characters",
        )?;
        let auth_token_rule =
            Validator::pattern(r"^[0-9a-fA-F]{32}$", "must be 32 hexadecimal characters")?;
        let e164_rule = Validator::pattern(
            r"^\+[1-9][0-9]{7,14}$",
            "must be in E.164 form, for example +15551234567",
        )?;
        let service_sid_rule = Validator::pattern(
            r"^MG[0-9a-fA-F]{32}$",
            "must be 'MG' followed by 32 hexadecimal characters",
        )?;

        let mut collector = CredentialCollector::new(prompter);
        collector.notify("SMS provider account.");
        let account_sid =
            collector.collect(&FieldSpec::new("sms_account_sid", "Account SID", account_sid_rule))?;
        let auth_token = collector.collect_secret(
            &FieldSpec::new("sms_auth_token", "Auth token", auth_token_rule).secret(),
        )?;
        let phone_number = collector.collect(&FieldSpec::new(
            "sms_phone_number",
            "Sender phone number",
            e164_rule,
        ))?;
        let service_sid = collector.collect(
            &FieldSpec::new(
                "sms_service_sid",
                "Messaging service SID (optional)",
                service_sid_rule,
            )
            .optional(),
        )?;

        let creds = MessagingCredentials {
            account_sid,
            auth_token,
            phone_number,
            messaging_service_sid: Some(service_sid).filter(|s| !s.is_empty()),
        };
        self.messaging = Some(creds.clone());
        Ok(creds)
    }

    /// Returns the IVR extension number, prompting on first use.
    pub fn ivr_extension(&mut self, prompter: &mut dyn Prompter) -> Result<String, PromptError> {
        if let Some(existing) = &self.ivr_extension {
            return Ok(existing.clone());
        }
        let extension = CredentialCollector::new(prompter).collect(
            &FieldSpec::new(
                "ivr_extension",
                "IVR extension number",
                Validator::DigitCount { min: 3, max: 6 },
            )
            .with_default(&self.defaults.ivr_extension),
        )?;
        self.ivr_extension = Some(extension.clone());
        Ok(extension)
    }
}
