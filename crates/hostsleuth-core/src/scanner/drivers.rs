/// Per-device analysis: look up the bound driver's properties.
use super::batch::ItemAnalyzer;
use crate::error::{Error, Result};
use crate::model::DriverDevice;
use crate::normalize::driver_from_raw;
use crate::platform::{DriverDetailSource, RawDevice};
use std::sync::Arc;

pub struct DriverAnalyzer {
    details: Arc<dyn DriverDetailSource>,
}

impl DriverAnalyzer {
    pub fn new(details: Arc<dyn DriverDetailSource>) -> Self {
        Self { details }
    }
}

impl ItemAnalyzer for DriverAnalyzer {
    type Item = RawDevice;
    type Output = DriverDevice;

    fn label(&self, item: &RawDevice) -> String {
        if item.friendly_name.is_empty() {
            item.instance_id.clone()
        } else {
            format!("{} ({})", item.friendly_name, item.instance_id)
        }
    }

    fn analyze(&self, item: &RawDevice) -> Result<DriverDevice> {
        let details = self.details.driver_details(&item.instance_id)?;
        Ok(driver_from_raw(item, Some(&details)))
    }

    /// The device row without driver columns.
    fn placeholder(&self, item: &RawDevice, _error: &Error) -> DriverDevice {
        driver_from_raw(item, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DriverDetails;
    use crate::scanner::run_to_completion;

    /// Fails for instance ids containing `BAD`.
    struct FakeDetails;

    impl DriverDetailSource for FakeDetails {
        fn driver_details(&self, instance_id: &str) -> Result<DriverDetails> {
            if instance_id.contains("BAD") {
                return Err(Error::QueryTimeout {
                    what: instance_id.to_string(),
                    secs: 15,
                });
            }
            Ok(DriverDetails {
                version: "1.0".into(),
                provider: "Contoso".into(),
                date: "2020-01-01".into(),
                inf_path: "oem1.inf".into(),
            })
        }
    }

    fn device(id: &str) -> RawDevice {
        RawDevice {
            friendly_name: format!("Device {id}"),
            class: "System".into(),
            status: "OK".into(),
            present: true,
            instance_id: id.into(),
        }
    }

    #[test]
    fn slow_device_becomes_placeholder() {
        let analyzer = DriverAnalyzer::new(Arc::new(FakeDetails));
        let items = vec![device("ROOT\\1"), device("ROOT\\BAD"), device("ROOT\\3")];
        let mut failures = 0;
        let out = run_to_completion(items, &analyzer, 2, |r| failures += r.failures.len());

        assert_eq!(out.len(), 3);
        assert_eq!(failures, 1);
        assert_eq!(out[0].driver_provider, "Contoso");
        assert_eq!(out[1].instance_id, "ROOT\\BAD");
        assert!(out[1].driver_version.is_empty());
        assert_eq!(out[2].driver_inf_path, "oem1.inf");
    }
}
