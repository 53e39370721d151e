// src/domains/sound.rs

use crate::{
    catalog::{DomainName, DomainProvider},
    models::{mapping, RawValue, RegistrySetting, SettingDefinition},
};

const AUDIO_SERVICE: &str = "Audiosrv";

pub struct SoundSettings;

impl DomainProvider for SoundSettings {
    fn domain_name(&self) -> &str {
        DomainName::Sound.as_ref()
    }

    fn settings(&self) -> anyhow::Result<Vec<SettingDefinition>> {
        Ok(vec![
            SettingDefinition::toggle(
                "sound-startup-sound",
                "Startup sound",
                "Play a sound when Windows starts",
            )
            .with_registry(RegistrySetting::dword(
                r"HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Authentication\LogonUI\BootAnimation",
                "DisableStartupSound",
                0,
                Some(1),
            )),
            SettingDefinition::selection(
                "sound-communications-ducking",
                "Communications activity",
                "What happens to other sounds during calls",
            )
            .with_registry(RegistrySetting::dword(
                r"HKEY_CURRENT_USER\Software\Microsoft\Multimedia\Audio",
                "UserDuckingPreference",
                3,
                None,
            ))
            .with_options(vec![
                ("Mute all other sounds", mapping([("UserDuckingPreference", RawValue::Int(0))])),
                ("Reduce by 80%", mapping([("UserDuckingPreference", RawValue::Int(1))])),
                ("Reduce by 50%", mapping([("UserDuckingPreference", RawValue::Int(2))])),
                ("Do nothing", mapping([("UserDuckingPreference", RawValue::Int(3))])),
            ]),
            SettingDefinition::toggle(
                "sound-show-disconnected-devices",
                "Show disconnected devices",
                "List unplugged playback and recording devices",
            )
            .with_registry(RegistrySetting::dword(
                r"HKEY_CURRENT_USER\Software\Microsoft\Multimedia\Audio\DeviceCpl",
                "ShowDisconnectedDevices",
                1,
                Some(0),
            ))
            .restarts_service(AUDIO_SERVICE),
        ])
    }
}
