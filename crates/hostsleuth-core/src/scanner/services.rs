/// Per-service analysis: startup type resolution plus both security checks.
use super::batch::ItemAnalyzer;
use crate::analysis::{
    assess_exe_acl, assess_service_control, ExeAclAssessment, FileAclSource,
    SecurityDescriptorSource, ServiceControlAssessment,
};
use crate::error::{Error, Result};
use crate::model::ServiceRecord;
use crate::normalize::service_from_raw;
use crate::platform::RawService;
use std::sync::Arc;

pub struct ServiceAnalyzer {
    descriptors: Arc<dyn SecurityDescriptorSource>,
    file_acls: Arc<dyn FileAclSource>,
}

impl ServiceAnalyzer {
    pub fn new(
        descriptors: Arc<dyn SecurityDescriptorSource>,
        file_acls: Arc<dyn FileAclSource>,
    ) -> Self {
        Self {
            descriptors,
            file_acls,
        }
    }

    /// Both assessments in full, for the detail view.
    pub fn assess(&self, raw: &RawService) -> (ServiceControlAssessment, ExeAclAssessment) {
        (
            assess_service_control(self.descriptors.as_ref(), &raw.name),
            assess_exe_acl(self.file_acls.as_ref(), &raw.path_name),
        )
    }
}

impl ItemAnalyzer for ServiceAnalyzer {
    type Item = RawService;
    type Output = ServiceRecord;

    fn label(&self, item: &RawService) -> String {
        item.name.clone()
    }

    fn analyze(&self, item: &RawService) -> Result<ServiceRecord> {
        let mut record = service_from_raw(item, item.delayed_auto_start);
        let (control, exe) = self.assess(item);
        apply_assessments(&mut record, &control, &exe);
        Ok(record)
    }

    fn placeholder(&self, item: &RawService, _error: &Error) -> ServiceRecord {
        service_from_raw(item, item.delayed_auto_start)
    }
}

/// Copy the assessment outcome into the record's security columns.
pub fn apply_assessments(
    record: &mut ServiceRecord,
    control: &ServiceControlAssessment,
    exe: &ExeAclAssessment,
) {
    record.service_control_risk = control.risk;
    record.service_control_detail = control.summary.clone();
    record.exe_write_risk = exe.risk;
    record.exe_acl_summary = exe.summary.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RawAce;
    use crate::model::{ExeWriteRisk, ServiceControlRisk, StartupType};
    use crate::platform::DelayedStartMap;
    use std::path::Path;

    struct FixedSddl(&'static str);

    impl SecurityDescriptorSource for FixedSddl {
        fn service_descriptor(&self, _service: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct NoAcl;

    impl FileAclSource for NoAcl {
        fn file_acl(&self, _path: &Path) -> Result<Vec<RawAce>> {
            Err(Error::query("acl", "denied"))
        }
    }

    #[test]
    fn weak_descriptor_and_missing_exe() {
        let delayed: DelayedStartMap = vec![("Contoso".to_string(), true)].into_iter().collect();
        let analyzer = ServiceAnalyzer::new(
            Arc::new(FixedSddl("D:(A;;CCLCSWRPWPDTLOCRRC;;;SY)(A;;RPWPDC;;;AU)")),
            Arc::new(NoAcl),
        );
        let raw = RawService {
            name: "Contoso".into(),
            display_name: "Contoso Agent".into(),
            state: "Running".into(),
            start_mode: "Auto".into(),
            start_name: "LocalSystem".into(),
            path_name: r"C:\no\such\dir\contoso.exe -service".into(),
            delayed_auto_start: None,
        };
        let mut services = vec![raw];
        delayed.annotate(&mut services);
        let raw = services.remove(0);
        let record = analyzer.analyze(&raw).unwrap();
        assert_eq!(record.startup_type, StartupType::AutomaticDelayed);
        assert_eq!(record.service_control_risk, ServiceControlRisk::Weak);
        assert!(record.service_control_detail.starts_with("Weak:"));
        assert_eq!(record.exe_write_risk, ExeWriteRisk::NotAvailable);
        assert_eq!(record.exe_acl_summary, "Not found");
        assert_eq!(record.exe_path, r"C:\no\such\dir\contoso.exe");
    }

    #[test]
    fn placeholder_keeps_identity() {
        let analyzer = ServiceAnalyzer::new(
            Arc::new(FixedSddl("")),
            Arc::new(NoAcl),
        );
        let raw = RawService {
            name: "Spooler".into(),
            ..Default::default()
        };
        let p = analyzer.placeholder(&raw, &Error::query("x", "y"));
        assert_eq!(p.name, "Spooler");
        assert_eq!(p.service_control_risk, ServiceControlRisk::NotAvailable);
        assert_eq!(p.exe_write_risk, ExeWriteRisk::NotAvailable);
    }
}
