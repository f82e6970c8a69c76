//! # Settings Persistence
//!
//! The merged store configuration lives in the `settings` collection under
//! one fixed id. Values are checked on the way in and on the way out, so a
//! till never starts selling with a rate or loyalty setup the core would
//! reject mid-sale.

use duka_core::Settings;
use tracing::{info, warn};

use crate::error::DbResult;
use crate::pool::Database;
use crate::repository::collection::SETTINGS_ID;

impl Database {
    /// Validates and stores the configuration.
    pub async fn save_settings(&self, settings: &Settings) -> DbResult<()> {
        if let Err(e) = settings.validate() {
            warn!(error = %e, "Refusing to store invalid settings");
            return Err(e.into());
        }
        self.collection::<Settings>().save(settings).await?;
        info!(currency = %settings.currency_code, vat_bps = settings.vat_rate.bps(), "Settings saved");
        Ok(())
    }

    /// Loads the stored configuration, or the defaults when none is stored.
    ///
    /// ## Errors
    /// A stored value that fails validation is returned as `DbError::Core`.
    pub async fn load_settings(&self) -> DbResult<Settings> {
        let settings = self
            .collection::<Settings>()
            .find(SETTINGS_ID)
            .await?
            .unwrap_or_default();
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::DbConfig;
    use duka_core::{ErrorKind, Money};

    #[tokio::test]
    async fn test_missing_settings_fall_back_to_defaults() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert_eq!(db.load_settings().await.unwrap(), Settings::default());
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut settings = Settings::default();
        settings.loyalty.enabled = true;
        settings.receipt_footer = "Karibu tena".to_string();

        db.save_settings(&settings).await.unwrap();
        assert_eq!(db.load_settings().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected_on_save_and_load() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut bad = Settings::default();
        bad.loyalty.enabled = true;
        bad.loyalty.spend_per_point = Money::zero();

        let err = db.save_settings(&bad).await.unwrap_err();
        assert!(matches!(&err, DbError::Core(e) if e.kind() == ErrorKind::Validation));
        assert_eq!(db.collection::<Settings>().count().await.unwrap(), 0);

        // Written past the check, e.g. by an older build
        db.collection::<Settings>().save(&bad).await.unwrap();
        let err = db.load_settings().await.unwrap_err();
        assert!(matches!(&err, DbError::Core(e) if e.kind() == ErrorKind::Validation));
    }
}
