mod bot;
mod cfg_ext;

pub(crate) use bot::Bot;
pub(crate) use cfg_ext::CfgExt;
