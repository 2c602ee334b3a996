// Copyright (C) 2026 Talkless Contributors
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//


//! Device selection by name for the `auto` device setting, and the routing
//! report printed by `talkless diagnose`.

use std::fmt;

/// Device name that asks for automatic selection.
pub const AUTO: &str = "auto";

/// What selection needs to know about a device.
pub trait DeviceInfo {
    fn name(&self) -> &str;
    fn max_input_channels(&self) -> u16;
    fn max_output_channels(&self) -> u16;
}

impl<T: DeviceInfo + ?Sized> DeviceInfo for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn max_input_channels(&self) -> u16 {
        (**self).max_input_channels()
    }

    fn max_output_channels(&self) -> u16 {
        (**self).max_output_channels()
    }
}

/// Whether the name looks like a virtual audio cable.
pub fn is_virtual_cable(name: &str) -> bool {
    name.to_lowercase().contains("cable")
}

/// Finds the playback side of a virtual audio cable. A VB-Audio cable wins
/// over any other device named like a cable.
pub fn find_cable<I, D>(devices: I) -> Option<D>
where
    I: IntoIterator<Item = D>,
    D: DeviceInfo,
{
    let mut fallback = None;
    for device in devices {
        if device.max_output_channels() == 0 || !is_virtual_cable(device.name()) {
            continue;
        }
        if device.name().to_lowercase().contains("vb") {
            return Some(device);
        }
        if fallback.is_none() {
            fallback = Some(device);
        }
    }
    fallback
}

/// Finds an input device named like a microphone. Cables never qualify.
pub fn find_microphone<I, D>(devices: I) -> Option<D>
where
    I: IntoIterator<Item = D>,
    D: DeviceInfo,
{
    devices.into_iter().find(|device| {
        device.max_input_channels() > 0
            && device.name().to_lowercase().contains("microphone")
            && !is_virtual_cable(device.name())
    })
}

/// A summary of the devices available for routing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    /// The cable `auto` would play into.
    pub cable: Option<String>,
    /// The microphone `auto` would capture from, if one is named as such.
    pub microphone: Option<String>,
    pub default_input: Option<String>,
    pub default_output: Option<String>,
}

impl Report {
    pub fn new<D>(
        devices: &[D],
        default_input: Option<String>,
        default_output: Option<String>,
    ) -> Report
    where
        D: DeviceInfo + fmt::Display,
    {
        Report {
            inputs: devices
                .iter()
                .filter(|device| device.max_input_channels() > 0)
                .map(ToString::to_string)
                .collect(),
            outputs: devices
                .iter()
                .filter(|device| device.max_output_channels() > 0)
                .map(ToString::to_string)
                .collect(),
            cable: find_cable(devices).map(|device| device.name().to_string()),
            microphone: find_microphone(devices).map(|device| device.name().to_string()),
            default_input,
            default_output,
        }
    }

    /// Routing problems worth telling the user about.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.cable.is_none() {
            warnings.push(
                "No virtual cable found. Install a virtual audio cable (e.g. VB-Audio Virtual Cable) and play into it."
                    .to_string(),
            );
        }
        match (&self.microphone, &self.default_input) {
            (Some(_), _) => {}
            (None, Some(default)) => warnings.push(format!(
                "No device is named like a microphone, the default input '{}' will be captured.",
                default
            )),
            (None, None) => {
                warnings.push("No input device found, the microphone will be silent.".to_string())
            }
        }
        if let Some(default) = &self.default_input {
            if is_virtual_cable(default) {
                warnings.push(format!(
                    "The default input '{}' is a virtual cable. Set input_device to your microphone.",
                    default
                ));
            }
        }
        warnings
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, title: &str, devices: &[String]) -> fmt::Result {
            writeln!(f, "{}:", title)?;
            if devices.is_empty() {
                return writeln!(f, "  none");
            }
            for device in devices {
                writeln!(f, "  - {}", device)?;
            }
            Ok(())
        }
        fn entry(f: &mut fmt::Formatter<'_>, title: &str, device: &Option<String>) -> fmt::Result {
            writeln!(f, "  {}: {}", title, device.as_deref().unwrap_or("not found"))
        }

        list(f, "Input devices", &self.inputs)?;
        list(f, "Output devices", &self.outputs)?;
        writeln!(f, "Routing:")?;
        entry(f, "Virtual cable", &self.cable)?;
        entry(f, "Microphone", &self.microphone)?;
        entry(f, "Default input", &self.default_input)?;
        entry(f, "Default output", &self.default_output)?;

        let warnings = self.warnings();
        if warnings.is_empty() {
            return writeln!(f, "All devices look correctly configured.");
        }
        writeln!(f, "Warnings:")?;
        for warning in warnings {
            writeln!(f, "  ! {}", warning)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Listed {
        name: &'static str,
        inputs: u16,
        outputs: u16,
    }

    impl DeviceInfo for Listed {
        fn name(&self) -> &str {
            self.name
        }

        fn max_input_channels(&self) -> u16 {
            self.inputs
        }

        fn max_output_channels(&self) -> u16 {
            self.outputs
        }
    }

    impl fmt::Display for Listed {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{} (In={}, Out={})", self.name, self.inputs, self.outputs)
        }
    }

    fn device(name: &'static str, inputs: u16, outputs: u16) -> Listed {
        Listed {
            name,
            inputs,
            outputs,
        }
    }

    fn windows_devices() -> Vec<Listed> {
        vec![
            device("Speakers (Realtek(R) Audio)", 0, 2),
            device("CABLE Output (VB-Audio Virtual Cable)", 2, 0),
            device("Microphone Array (Realtek(R) Audio)", 2, 0),
            device("CABLE Input (VB-Audio Virtual Cable)", 0, 2),
        ]
    }

    #[test]
    fn test_find_cable_prefers_vb_output() {
        let devices = vec![
            device("Cable Adapter", 0, 2),
            device("CABLE Output (VB-Audio Virtual Cable)", 2, 0),
            device("CABLE Input (VB-Audio Virtual Cable)", 0, 2),
        ];
        assert_eq!(
            find_cable(&devices).map(|device| device.name),
            Some("CABLE Input (VB-Audio Virtual Cable)")
        );

        let other = vec![device("Speakers", 0, 2), device("Loopback Cable", 0, 2)];
        assert_eq!(
            find_cable(&other).map(|device| device.name),
            Some("Loopback Cable")
        );
        assert!(find_cable(&[device("Speakers", 0, 2)]).is_none());
    }

    #[test]
    fn test_find_microphone() {
        assert_eq!(
            find_microphone(&windows_devices()).map(|device| device.name),
            Some("Microphone Array (Realtek(R) Audio)")
        );

        // Output-only and cable devices never count as microphones.
        let devices = vec![
            device("Microphone Monitor", 0, 2),
            device("Microphone CABLE", 2, 0),
            device("USB Audio", 1, 0),
        ];
        assert!(find_microphone(&devices).is_none());
    }

    #[test]
    fn test_find_consumes_owned_devices() {
        let cable = find_cable(windows_devices()).unwrap();
        assert_eq!(cable.name, "CABLE Input (VB-Audio Virtual Cable)");
    }

    #[test]
    fn test_report_healthy_setup() {
        let report = Report::new(
            &windows_devices(),
            Some("Microphone Array (Realtek(R) Audio)".to_string()),
            Some("Speakers (Realtek(R) Audio)".to_string()),
        );
        assert_eq!(report.inputs.len(), 2);
        assert_eq!(report.outputs.len(), 2);
        assert_eq!(
            report.cable.as_deref(),
            Some("CABLE Input (VB-Audio Virtual Cable)")
        );
        assert!(report.warnings().is_empty());
        assert!(report
            .to_string()
            .contains("All devices look correctly configured."));
    }

    #[test]
    fn test_report_warnings() {
        let devices = vec![
            device("CABLE Output (VB-Audio Virtual Cable)", 2, 0),
            device("Speakers", 0, 2),
        ];
        let report = Report::new(
            &devices,
            Some("CABLE Output (VB-Audio Virtual Cable)".to_string()),
            None,
        );
        assert!(report.cable.is_none());
        assert!(report.microphone.is_none());
        assert_eq!(report.warnings().len(), 3);

        let printed = report.to_string();
        assert!(printed.contains("Virtual cable: not found"));
        assert!(printed.contains("Default output: not found"));
        assert!(printed.contains("is a virtual cable"));

        let empty = Report::new::<Listed>(&[], None, None);
        assert!(empty.to_string().contains("Input devices:\n  none"));
        assert!(empty
            .warnings()
            .iter()
            .any(|warning| warning.contains("microphone will be silent")));
    }
}
