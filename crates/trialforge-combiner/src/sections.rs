//! Module-id to document-section mapping, ported from
//! `usdm_combiner.py`'s `MODULE_TO_USDM_SECTION` table and
//! `_get_instance_type`.

/// Section key a module's output is nested under in the unified document.
/// Falls back to the module id itself for modules not in the table, same
/// as the Python `dict.get(module_id, module_id)` fallback.
#[must_use]
pub fn section_key(module_id: &str) -> &str {
    match module_id {
        "study_metadata" => "studyMetadata",
        "arms_design" => "studyDesign",
        "endpoints_estimands_sap" => "endpointsEstimandsSAP",
        "adverse_events" => "adverseEvents",
        "safety_decision_points" => "safetyDecisionPoints",
        "concomitant_medications" => "concomitantMedications",
        "biospecimen_handling" => "biospecimenHandling",
        "laboratory_specifications" => "laboratorySpecifications",
        "data_management" => "dataManagement",
        "site_operations_logistics" => "siteOperationsLogistics",
        "quality_management" => "qualityManagement",
        "withdrawal_procedures" => "withdrawalProcedures",
        "imaging_central_reading" => "imagingCentralReading",
        "pkpd_sampling" => "pkpdSampling",
        "informed_consent" => "informedConsent",
        "pro_specifications" => "proSpecifications",
        other => other,
    }
}

/// `instanceType` tag stamped on a module's section entry.
#[must_use]
pub fn instance_type(module_id: &str) -> &str {
    match module_id {
        "arms_design" => "StudyDesign",
        "endpoints_estimands_sap" => "EndpointsEstimandsSAP",
        "adverse_events" => "AdverseEvents",
        "safety_decision_points" => "SafetyDecisionPoints",
        "concomitant_medications" => "ConcomitantMedications",
        "biospecimen_handling" => "BiospecimenHandling",
        "laboratory_specifications" => "LaboratorySpecifications",
        "data_management" => "DataManagement",
        "site_operations_logistics" => "SiteOperationsLogistics",
        "quality_management" => "QualityManagement",
        "withdrawal_procedures" => "WithdrawalProcedures",
        "imaging_central_reading" => "ImagingCentralReading",
        "pkpd_sampling" => "PKPDSampling",
        "informed_consent" => "InformedConsentElements",
        "pro_specifications" => "PROSpecifications",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_module_maps_to_its_declared_section() {
        assert_eq!(section_key("arms_design"), "studyDesign");
        assert_eq!(instance_type("arms_design"), "StudyDesign");
    }

    #[test]
    fn unknown_module_falls_back_to_its_own_id() {
        assert_eq!(section_key("some_future_module"), "some_future_module");
        assert_eq!(instance_type("some_future_module"), "some_future_module");
    }
}
