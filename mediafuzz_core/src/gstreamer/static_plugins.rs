//! Registration of plugins linked into the binary.

use crate::HarnessError;

#[cfg(feature = "static-plugins")]
unsafe extern "C" {
    fn gst_plugin_coreelements_register();
    fn gst_plugin_playback_register();
    fn gst_plugin_typefindfunctions_register();
    fn gst_plugin_app_register();
    fn gst_plugin_ogg_register();
    fn gst_plugin_theora_register();
    fn gst_plugin_vorbis_register();
}

#[cfg(feature = "static-plugins")]
const LINKED: &[(&str, unsafe extern "C" fn())] = &[
    ("coreelements", gst_plugin_coreelements_register),
    ("playback", gst_plugin_playback_register),
    ("typefindfunctions", gst_plugin_typefindfunctions_register),
    ("app", gst_plugin_app_register),
    ("ogg", gst_plugin_ogg_register),
    ("theora", gst_plugin_theora_register),
    ("vorbis", gst_plugin_vorbis_register),
];

#[cfg(feature = "static-plugins")]
pub(super) fn register(name: &str) -> Result<(), HarnessError> {
    let (_, register) = LINKED
        .iter()
        .find(|(linked, _)| *linked == name)
        .ok_or_else(|| HarnessError::PluginRegistration {
            name: name.to_string(),
            reason: "not linked into this binary".to_string(),
        })?;
    // SAFETY: the symbols come from the plugin archives linked into the
    // binary and only touch the registry gst::init() created.
    unsafe { register() };
    Ok(())
}

#[cfg(not(feature = "static-plugins"))]
pub(super) fn register(name: &str) -> Result<(), HarnessError> {
    Err(HarnessError::PluginRegistration {
        name: name.to_string(),
        reason: "built without the static-plugins feature".to_string(),
    })
}
