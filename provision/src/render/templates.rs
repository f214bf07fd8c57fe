//! Built-in templates for the InfoCall stack.

use super::Template;
use crate::core::ArtifactKind;

/// Apache virtual host serving the WSGI application.
pub const APACHE_VHOST: Template = Template::new(
    ArtifactKind::ServiceConfig,
    "apache_vhost",
    r"<VirtualHost *:{HTTP_PORT}>
    ServerName {SERVER_NAME}

    WSGIDaemonProcess infocall user={WSGI_USER} group={WSGI_GROUP} threads={WSGI_THREADS} python-path={APP_ROOT}
    WSGIScriptAlias / {APP_ROOT}/wsgi.py

    <Directory {APP_ROOT}>
        WSGIProcessGroup infocall
        WSGIApplicationGroup %{{GLOBAL}}
        Require all granted
    </Directory>

    ErrorLog {LOG_DIR}/apache_error.log
    CustomLog {LOG_DIR}/apache_access.log combined
</VirtualHost>
",
);

/// AMI manager user stanza, placed inside a managed block.
pub const AMI_USER: Template = Template::new(
    ArtifactKind::ServiceConfig,
    "ami_user",
    r"[{AMI_USER}]
secret = {AMI_SECRET}
deny = 0.0.0.0/0.0.0.0
permit = {AMI_PERMIT}
read = system,call,log,verbose,command,agent,user,config,originate
write = system,call,log,verbose,command,agent,user,config,originate
writetimeout = 5000",
);

/// IVR dialplan context, placed inside a managed block.
pub const IVR_DIALPLAN: Template = Template::new(
    ArtifactKind::ServiceConfig,
    "ivr_dialplan",
    r"[{IVR_CONTEXT}]
exten => {IVR_EXTENSION},1,NoOp(InfoCall IVR ${{EXTEN}})
 same => n,Answer()
 same => n,Wait(1)
 same => n,AGI({AGI_SCRIPT})
 same => n,Hangup()

[{DIALPLAN_INCLUDE_CONTEXT}]
include => {IVR_CONTEXT}",
);

/// Packet filter accept rule for the web port, placed inside a managed block.
pub const FIREWALL_ACCEPT: Template = Template::new(
    ArtifactKind::FirewallRule,
    "firewall_accept",
    "-A INPUT -p tcp -m tcp --dport {HTTP_PORT} -j ACCEPT",
);

/// Database, application user and grants.
///
/// `DB_PASSWORD` must already be escaped with [`super::sql_string`].
pub const DB_BOOTSTRAP: Template = Template::new(
    ArtifactKind::SqlBatch,
    "db_bootstrap",
    r"CREATE DATABASE IF NOT EXISTS `{DB_NAME}` CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci;
CREATE USER IF NOT EXISTS '{DB_USER}'@'{DB_CLIENT_HOST}' IDENTIFIED BY '{DB_PASSWORD}';
ALTER USER '{DB_USER}'@'{DB_CLIENT_HOST}' IDENTIFIED BY '{DB_PASSWORD}';
GRANT ALL PRIVILEGES ON `{DB_NAME}`.* TO '{DB_USER}'@'{DB_CLIENT_HOST}';
FLUSH PRIVILEGES;
",
);

/// Counts the tables of a database.
pub const TABLE_COUNT: Template = Template::new(
    ArtifactKind::SqlBatch,
    "table_count",
    "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = '{DB_NAME}';\n",
);

/// Looks up an account by email.
pub const ACCOUNT_LOOKUP: Template = Template::new(
    ArtifactKind::SqlBatch,
    "account_lookup",
    "SELECT id, role FROM users WHERE email = '{EMAIL}' LIMIT 1;\n",
);

/// Inserts a new account. Hash values are bcrypt strings.
pub const ACCOUNT_INSERT: Template = Template::new(
    ArtifactKind::SqlBatch,
    "account_insert",
    r"INSERT INTO users (email, password, phone_number, ivr_passcode_hash, role)
VALUES ('{EMAIL}', '{PASSWORD_HASH}', '{PHONE_NUMBER}', '{PASSCODE_HASH}', '{ROLE}');
",
);

/// Replaces the credentials of an existing account.
pub const ACCOUNT_UPDATE: Template = Template::new(
    ArtifactKind::SqlBatch,
    "account_update",
    r"UPDATE users
SET password = '{PASSWORD_HASH}', phone_number = '{PHONE_NUMBER}', ivr_passcode_hash = '{PASSCODE_HASH}', role = '{ROLE}'
WHERE email = '{EMAIL}';
",
);

/// Application settings module read by the web application at import time.
///
/// String values must be supplied as complete literals from
/// [`super::python_literal`]; `TWILIO_MESSAGING_SERVICE_SID` may be `None`.
pub const APP_SETTINGS: Template = Template::new(
    ArtifactKind::Settings,
    "app_settings",
    r"# Generated by infocall-setup. Changes are overwritten when the settings stage runs again.

# Database
DB_HOST = {DB_HOST}
DB_USER = {DB_USER}
DB_PASSWORD = {DB_PASSWORD}
DB_NAME = {DB_NAME}

# Asterisk Manager Interface
AMI_HOST = {AMI_HOST}
AMI_PORT = {AMI_PORT}
AMI_USERNAME = {AMI_USERNAME}
AMI_SECRET = {AMI_SECRET}

# Messaging
TWILIO_ACCOUNT_SID = {TWILIO_ACCOUNT_SID}
TWILIO_AUTH_TOKEN = {TWILIO_AUTH_TOKEN}
TWILIO_PHONE_NUMBER = {TWILIO_PHONE_NUMBER}
TWILIO_MESSAGING_SERVICE_SID = {TWILIO_MESSAGING_SERVICE_SID}

# Limits
MAX_CONCURRENT_CALLS = {MAX_CONCURRENT_CALLS}
MAX_SMS_PER_MINUTE = {MAX_SMS_PER_MINUTE}
",
);

/// Every built-in template.
pub const ALL: &[Template] = &[
    APACHE_VHOST,
    AMI_USER,
    IVR_DIALPLAN,
    FIREWALL_ACCEPT,
    DB_BOOTSTRAP,
    TABLE_COUNT,
    ACCOUNT_LOOKUP,
    ACCOUNT_INSERT,
    ACCOUNT_UPDATE,
    APP_SETTINGS,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Substitutions;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_all_templates_parse() {
        for template in ALL {
            assert!(template.placeholders().is_ok(), "{} failed to parse", template.name());
        }
    }

    #[test]
    fn test_vhost_keeps_apache_variable() {
        let subs = Substitutions::new()
            .with("HTTP_PORT", "80")
            .with("SERVER_NAME", "infocall.local")
            .with("WSGI_USER", "www-data")
            .with("WSGI_GROUP", "www-data")
            .with("WSGI_THREADS", "5")
            .with("APP_ROOT", "/var/www/html/infocall")
            .with("LOG_DIR", "/var/www/html/infocall/logs");

        let text = APACHE_VHOST.render(&subs).unwrap().into_content();

        assert!(text.contains("WSGIApplicationGroup %{GLOBAL}"));
        assert!(text.contains("WSGIScriptAlias / /var/www/html/infocall/wsgi.py"));
        assert!(text.starts_with("<VirtualHost *:80>"));
    }

    #[test]
    fn test_firewall_rule() {
        let subs = Substitutions::new().with("HTTP_PORT", "8080");
        assert_eq!(
            FIREWALL_ACCEPT.render(&subs).unwrap().content(),
            "-A INPUT -p tcp -m tcp --dport 8080 -j ACCEPT"
        );
    }

    #[test]
    fn test_dialplan_keeps_asterisk_variable() {
        let subs = Substitutions::new()
            .with("IVR_CONTEXT", "infocall-ivr")
            .with("IVR_EXTENSION", "7777")
            .with("AGI_SCRIPT", "ivr_handler.agi")
            .with("DIALPLAN_INCLUDE_CONTEXT", "from-internal-custom");

        let text = IVR_DIALPLAN.render(&subs).unwrap().into_content();

        assert!(text.contains("exten => 7777,1,NoOp(InfoCall IVR ${EXTEN})"));
        assert!(text.ends_with("include => infocall-ivr"));
    }

    #[test]
    fn test_settings_placeholders() {
        let names = APP_SETTINGS.placeholders().unwrap();
        for key in [
            "DB_HOST",
            "DB_USER",
            "DB_PASSWORD",
            "DB_NAME",
            "AMI_HOST",
            "AMI_PORT",
            "AMI_USERNAME",
            "AMI_SECRET",
            "TWILIO_ACCOUNT_SID",
            "TWILIO_AUTH_TOKEN",
            "TWILIO_PHONE_NUMBER",
            "TWILIO_MESSAGING_SERVICE_SID",
            "MAX_CONCURRENT_CALLS",
            "MAX_SMS_PER_MINUTE",
        ] {
            assert!(names.contains(key), "missing {key}");
        }
        assert_eq!(names.len(), 14);
    }
}
