//! EMV tag constants and the tag description dictionary

/// EMV Tag identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EmvTag(pub &'static [u8]);

impl EmvTag {
    pub fn bytes(&self) -> &'static [u8] {
        self.0
    }
}

impl AsRef<[u8]> for EmvTag {
    fn as_ref(&self) -> &[u8] {
        self.0
    }
}

// Application selection
pub const APPLICATION_IDENTIFIER: EmvTag = EmvTag(&[0x4F]);
pub const APPLICATION_LABEL: EmvTag = EmvTag(&[0x50]);
pub const APPLICATION_TEMPLATE: EmvTag = EmvTag(&[0x61]);
pub const FCI_TEMPLATE: EmvTag = EmvTag(&[0x6F]);
pub const DEDICATED_FILE_NAME: EmvTag = EmvTag(&[0x84]);
pub const APPLICATION_PRIORITY_INDICATOR: EmvTag = EmvTag(&[0x87]);
pub const SHORT_FILE_IDENTIFIER: EmvTag = EmvTag(&[0x88]);
pub const FCI_PROPRIETARY_TEMPLATE: EmvTag = EmvTag(&[0xA5]);
pub const FCI_ISSUER_DISCRETIONARY_DATA: EmvTag = EmvTag(&[0xBF, 0x0C]);
pub const APPLICATION_PREFERRED_NAME: EmvTag = EmvTag(&[0x9F, 0x12]);
pub const PDOL: EmvTag = EmvTag(&[0x9F, 0x38]);

// Processing options
pub const RESPONSE_MESSAGE_TEMPLATE_FORMAT_1: EmvTag = EmvTag(&[0x80]);
pub const RESPONSE_MESSAGE_TEMPLATE_FORMAT_2: EmvTag = EmvTag(&[0x77]);
pub const COMMAND_TEMPLATE: EmvTag = EmvTag(&[0x83]);
pub const AIP: EmvTag = EmvTag(&[0x82]);
pub const AFL: EmvTag = EmvTag(&[0x94]);

// Records
pub const RECORD_TEMPLATE: EmvTag = EmvTag(&[0x70]);

// GET DATA objects
pub const APPLICATION_TRANSACTION_COUNTER: EmvTag = EmvTag(&[0x9F, 0x36]);
pub const LAST_ONLINE_ATC_REGISTER: EmvTag = EmvTag(&[0x9F, 0x13]);
pub const PIN_TRY_COUNTER: EmvTag = EmvTag(&[0x9F, 0x17]);

/// Returned by [`lookup_description`] for tags not in the dictionary
pub const NO_DESCRIPTION: &str = "None";

/// Get a human-readable name for an EMV tag
pub fn tag_name(tag: &[u8]) -> Option<&'static str> {
    let name = match tag {
        [0x42] => "Issuer Identification Number (IIN)",
        [0x4F] => "Application Identifier (AID) - card",
        [0x50] => "Application Label",
        [0x56] => "Track 1 Data",
        [0x57] => "Track 2 Equivalent Data",
        [0x5A] => "Application Primary Account Number (PAN)",
        [0x5F, 0x20] => "Cardholder Name",
        [0x5F, 0x24] => "Application Expiration Date",
        [0x5F, 0x25] => "Application Effective Date",
        [0x5F, 0x28] => "Issuer Country Code",
        [0x5F, 0x2A] => "Transaction Currency Code",
        [0x5F, 0x2D] => "Language Preference",
        [0x5F, 0x30] => "Service Code",
        [0x5F, 0x34] => "Application PAN Sequence Number",
        [0x5F, 0x50] => "Issuer URL",
        [0x5F, 0x53] => "International Bank Account Number (IBAN)",
        [0x5F, 0x54] => "Bank Identifier Code (BIC)",
        [0x5F, 0x55] => "Issuer Country Code (alpha2 format)",
        [0x5F, 0x56] => "Issuer Country Code (alpha3 format)",
        [0x61] => "Application Template",
        [0x6F] => "File Control Information (FCI) Template",
        [0x70] => "READ RECORD Response Message Template",
        [0x73] => "Directory Discretionary Template",
        [0x77] => "Response Message Template Format 2",
        [0x80] => "Response Message Template Format 1",
        [0x82] => "Application Interchange Profile",
        [0x83] => "Command Template",
        [0x84] => "Dedicated File (DF) Name",
        [0x87] => "Application Priority Indicator",
        [0x88] => "Short File Identifier (SFI)",
        [0x8C] => "Card Risk Management Data Object List 1 (CDOL1)",
        [0x8D] => "Card Risk Management Data Object List 2 (CDOL2)",
        [0x8E] => "Cardholder Verification Method (CVM) List",
        [0x8F] => "Certification Authority Public Key Index",
        [0x90] => "Issuer Public Key Certificate",
        [0x92] => "Issuer Public Key Remainder",
        [0x93] => "Signed Static Application Data",
        [0x94] => "Application File Locator (AFL)",
        [0x97] => "Transaction Certificate Data Object List (TDOL)",
        [0x9D] => "Directory Definition File (DDF) Name",
        [0xA5] => "File Control Information (FCI) Proprietary Template",
        [0xBF, 0x0C] => "File Control Information (FCI) Issuer Discretionary Data",
        [0x9F, 0x05] => "Application Discretionary Data",
        [0x9F, 0x07] => "Application Usage Control",
        [0x9F, 0x08] => "Application Version Number - card",
        [0x9F, 0x0B] => "Cardholder Name Extended",
        [0x9F, 0x0D] => "Issuer Action Code - Default",
        [0x9F, 0x0E] => "Issuer Action Code - Denial",
        [0x9F, 0x0F] => "Issuer Action Code - Online",
        [0x9F, 0x10] => "Issuer Application Data",
        [0x9F, 0x11] => "Issuer Code Table Index",
        [0x9F, 0x12] => "Application Preferred Name",
        [0x9F, 0x13] => "Last Online Application Transaction Counter (ATC) Register",
        [0x9F, 0x14] => "Lower Consecutive Offline Limit",
        [0x9F, 0x17] => "Personal Identification Number (PIN) Try Counter",
        [0x9F, 0x1F] => "Track 1 Discretionary Data",
        [0x9F, 0x20] => "Track 2 Discretionary Data",
        [0x9F, 0x23] => "Upper Consecutive Offline Limit",
        [0x9F, 0x26] => "Application Cryptogram",
        [0x9F, 0x27] => "Cryptogram Information Data",
        [0x9F, 0x2D] => "ICC PIN Encipherment Public Key Certificate",
        [0x9F, 0x2E] => "ICC PIN Encipherment Public Key Exponent",
        [0x9F, 0x2F] => "ICC PIN Encipherment Public Key Remainder",
        [0x9F, 0x32] => "Issuer Public Key Exponent",
        [0x9F, 0x36] => "Application Transaction Counter (ATC)",
        [0x9F, 0x38] => "Processing Options Data Object List (PDOL)",
        [0x9F, 0x42] => "Application Currency Code",
        [0x9F, 0x44] => "Application Currency Exponent",
        [0x9F, 0x45] => "Data Authentication Code",
        [0x9F, 0x46] => "ICC Public Key Certificate",
        [0x9F, 0x47] => "ICC Public Key Exponent",
        [0x9F, 0x48] => "ICC Public Key Remainder",
        [0x9F, 0x49] => "Dynamic Data Authentication Data Object List (DDOL)",
        [0x9F, 0x4A] => "Static Data Authentication Tag List",
        [0x9F, 0x4B] => "Signed Dynamic Application Data",
        [0x9F, 0x4C] => "ICC Dynamic Number",
        [0x9F, 0x4D] => "Log Entry",
        [0x9F, 0x4F] => "Log Format",
        [0x9F, 0x62] => "Track 1 Bit Map for CVC3",
        [0x9F, 0x63] => "Track 1 Bit Map for UN and ATC",
        [0x9F, 0x64] => "Track 1 Number of ATC Digits",
        [0x9F, 0x65] => "Track 2 Bit Map for CVC3",
        [0x9F, 0x66] => "Terminal Transaction Qualifiers",
        [0x9F, 0x67] => "Track 2 Number of ATC Digits",
        [0x9F, 0x69] => "Card Authentication Related Data",
        [0x9F, 0x6B] => "Track 2 Data",
        [0x9F, 0x6C] => "Card Transaction Qualifiers",
        [0x9F, 0x6E] => "Form Factor Indicator",
        [0x9F, 0x7C] => "Customer Exclusive Data",
        _ => return None,
    };
    Some(name)
}

/// Look up a tag description by its exact uppercase hex form, e.g. `"9F36"`
///
/// Returns [`NO_DESCRIPTION`] for unknown tags and for keys that are not
/// uppercase hex.
pub fn lookup_description(tag_hex: &str) -> &'static str {
    if tag_hex.bytes().any(|b| b.is_ascii_lowercase()) {
        return NO_DESCRIPTION;
    }
    hex::decode(tag_hex)
        .ok()
        .and_then(|tag| tag_name(&tag))
        .unwrap_or(NO_DESCRIPTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_description() {
        assert_eq!(lookup_description("9F36"), "Application Transaction Counter (ATC)");
        assert_eq!(lookup_description("94"), "Application File Locator (AFL)");
        assert_eq!(lookup_description("DF01"), NO_DESCRIPTION);
    }

    #[test]
    fn test_lookup_is_exact_uppercase() {
        assert_eq!(lookup_description("9f36"), NO_DESCRIPTION);
        assert_eq!(lookup_description("9F3"), NO_DESCRIPTION);
        assert_eq!(lookup_description(""), NO_DESCRIPTION);
    }

    #[test]
    fn test_tag_constants_have_names() {
        for tag in [SHORT_FILE_IDENTIFIER, AIP, AFL, APPLICATION_TEMPLATE, PIN_TRY_COUNTER] {
            assert!(tag_name(tag.bytes()).is_some(), "{:02X?}", tag);
        }
    }
}
