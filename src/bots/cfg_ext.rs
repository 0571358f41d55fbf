use crate::immut_data::dynamic::{BotCfg, CooldownStore};

pub(crate) trait CfgExt {
    fn discord_token(&self) -> &str;
    fn discord_prefix(&self) -> &str;
    fn cooldown_store(&self) -> CooldownStore;
    fn cfg(&self) -> BotCfg;
}

macro_rules! impl_cfg_ext {
    ($t:ty) => {
        impl crate::bots::CfgExt for $t {
            fn discord_token(&self) -> &str {
                &self.cfg.discord_token
            }

            fn discord_prefix(&self) -> &str {
                &self.cfg.discord_prefix
            }

            fn cooldown_store(&self) -> crate::immut_data::dynamic::CooldownStore {
                self.cfg.cooldown_store
            }

            fn cfg(&self) -> BotCfg {
                self.cfg.clone()
            }
        }
    };
}

pub(super) use impl_cfg_ext;
