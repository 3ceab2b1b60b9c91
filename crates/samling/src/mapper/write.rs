//! Domain to XML mapping.
//!
//! The writer is the exact inverse of the reader: every field the reader
//! consumes is emitted here, optional fields are omitted when unset, and
//! booleans that default to false are only written when true. Objects
//! carrying a signing key come out as signed documents; everything else is
//! emitted unsigned.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{SamlError, SamlResult};
use crate::signature::signer::XmlSigner;
use crate::signature::SigningKey;
use crate::types::{
    Assertion, AuthnRequest, EntitiesCollection, Endpoint, IdpDescriptor, Issuer, Metadata,
    NameId, Provider, SamlObject, SpDescriptor, MD_NS, SAMLP_NS, SAML_NS,
};

/// Serializes a domain object to XML, signing it when the object carries a
/// signing key.
pub fn write_document(object: &SamlObject) -> SamlResult<String> {
    match object {
        SamlObject::Metadata(metadata) => {
            let id = resolved_id(metadata.id.as_deref(), metadata.signing_key.is_some(), "M");
            let xml = metadata_fragment(metadata, id.as_deref());
            sign_if_keyed(xml, id.as_deref(), metadata.signing_key.as_ref())
        }
        SamlObject::EntitiesCollection(collection) => write_entities(collection),
        SamlObject::AuthnRequest(request) => {
            let xml = authn_request_fragment(request);
            sign_if_keyed(xml, Some(&request.id), request.signing_key.as_ref())
        }
        SamlObject::Assertion(assertion) => {
            let xml = assertion_fragment(assertion);
            sign_if_keyed(xml, Some(&assertion.id), assertion.signing_key.as_ref())
        }
        SamlObject::Response(_) | SamlObject::LogoutRequest(_) | SamlObject::LogoutResponse(_) => {
            Err(SamlError::UnsupportedObjectKind(object.kind().to_string()))
        }
    }
}

fn sign_if_keyed(xml: String, id: Option<&str>, key: Option<&SigningKey>) -> SamlResult<String> {
    match (key, id) {
        (Some(key), Some(id)) => XmlSigner::new(key).sign(&xml, id),
        (Some(_), None) => Err(SamlError::SignatureCreation(
            "signed element needs an ID".to_string(),
        )),
        _ => Ok(xml),
    }
}

/// Keeps an existing ID, generates one only when signing demands a
/// reference target.
fn resolved_id(id: Option<&str>, signing: bool, prefix: &str) -> Option<String> {
    match id {
        Some(id) => Some(id.to_string()),
        None if signing => Some(format!("{prefix}{}", uuid::Uuid::new_v4())),
        None => None,
    }
}

fn metadata_fragment(metadata: &Metadata, id: Option<&str>) -> String {
    let mut xml = format!(r#"<md:EntityDescriptor xmlns:md="{MD_NS}""#);
    push_attr(&mut xml, "entityID", Some(&metadata.entity_id));
    push_attr(&mut xml, "ID", id);
    push_instant_attr(&mut xml, "validUntil", metadata.valid_until.as_ref());
    push_attr(&mut xml, "cacheDuration", metadata.cache_duration.as_deref());
    xml.push('>');

    for provider in &metadata.providers {
        match provider {
            Provider::ServiceProvider(sp) => sp_fragment(&mut xml, sp),
            Provider::IdentityProvider(idp) => idp_fragment(&mut xml, idp),
        }
    }

    xml.push_str("</md:EntityDescriptor>");
    xml
}

fn write_entities(collection: &EntitiesCollection) -> SamlResult<String> {
    let mut xml = format!(r#"<md:EntitiesDescriptor xmlns:md="{MD_NS}""#);
    push_attr(&mut xml, "ID", collection.id.as_deref());
    push_attr(&mut xml, "Name", collection.name.as_deref());
    xml.push('>');

    let mut signed_entities = Vec::new();
    for entity in &collection.entities {
        let id = resolved_id(entity.id.as_deref(), entity.signing_key.is_some(), "M");
        xml.push_str(&metadata_fragment(entity, id.as_deref()));
        if let (Some(key), Some(id)) = (&entity.signing_key, id) {
            signed_entities.push((key, id));
        }
    }
    xml.push_str("</md:EntitiesDescriptor>");

    // Each signed entity gets its own enveloped signature; signing one
    // entity does not disturb the bytes of its siblings.
    for (key, id) in signed_entities {
        xml = XmlSigner::new(key).sign(&xml, &id)?;
    }
    Ok(xml)
}

fn sp_fragment(xml: &mut String, sp: &SpDescriptor) {
    xml.push_str("<md:SPSSODescriptor");
    push_attr(xml, "ID", sp.id.as_deref());
    push_instant_attr(xml, "validUntil", sp.valid_until.as_ref());
    push_attr(xml, "cacheDuration", sp.cache_duration.as_deref());
    push_list_attr(xml, "protocolSupportEnumeration", &sp.protocol_support_enumeration);
    push_flag_attr(xml, "AuthnRequestsSigned", sp.authn_requests_signed);
    push_flag_attr(xml, "WantAssertionsSigned", sp.want_assertions_signed);
    xml.push('>');

    key_descriptor_fragments(xml, &sp.key_descriptors);
    endpoint_fragments(xml, "ArtifactResolutionService", &sp.artifact_resolution_services);
    endpoint_fragments(xml, "SingleLogoutService", &sp.single_logout_services);
    name_id_format_fragments(xml, &sp.name_id_formats);
    endpoint_fragments(xml, "AssertionConsumerService", &sp.assertion_consumer_services);

    if !sp.requested_attributes.is_empty() {
        xml.push_str(r#"<md:AttributeConsumingService index="0" isDefault="true">"#);
        for attr in &sp.requested_attributes {
            xml.push_str("<md:RequestedAttribute");
            push_attr(xml, "Name", Some(&attr.name));
            push_attr(xml, "FriendlyName", attr.friendly_name.as_deref());
            push_attr(xml, "NameFormat", attr.name_format.as_deref());
            push_flag_attr(xml, "isRequired", attr.required);
            xml.push_str("/>");
        }
        xml.push_str("</md:AttributeConsumingService>");
    }

    xml.push_str("</md:SPSSODescriptor>");
}

fn idp_fragment(xml: &mut String, idp: &IdpDescriptor) {
    xml.push_str("<md:IDPSSODescriptor");
    push_attr(xml, "ID", idp.id.as_deref());
    push_instant_attr(xml, "validUntil", idp.valid_until.as_ref());
    push_attr(xml, "cacheDuration", idp.cache_duration.as_deref());
    push_list_attr(xml, "protocolSupportEnumeration", &idp.protocol_support_enumeration);
    push_flag_attr(xml, "WantAuthnRequestsSigned", idp.want_authn_requests_signed);
    xml.push('>');

    key_descriptor_fragments(xml, &idp.key_descriptors);
    endpoint_fragments(xml, "ArtifactResolutionService", &idp.artifact_resolution_services);
    endpoint_fragments(xml, "SingleLogoutService", &idp.single_logout_services);
    name_id_format_fragments(xml, &idp.name_id_formats);
    endpoint_fragments(xml, "SingleSignOnService", &idp.single_sign_on_services);

    xml.push_str("</md:IDPSSODescriptor>");
}

fn key_descriptor_fragments(xml: &mut String, descriptors: &[crate::types::KeyDescriptor]) {
    for descriptor in descriptors {
        xml.push_str("<md:KeyDescriptor");
        push_attr(xml, "use", descriptor.usage.as_str());
        xml.push('>');
        xml.push_str(
            r#"<ds:KeyInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:X509Data><ds:X509Certificate>"#,
        );
        xml.push_str(&esc(&descriptor.certificate));
        xml.push_str("</ds:X509Certificate></ds:X509Data></ds:KeyInfo></md:KeyDescriptor>");
    }
}

fn name_id_format_fragments(xml: &mut String, formats: &[String]) {
    for format in formats {
        xml.push_str("<md:NameIDFormat>");
        xml.push_str(&esc(format));
        xml.push_str("</md:NameIDFormat>");
    }
}

fn endpoint_fragments(xml: &mut String, local_name: &str, endpoints: &[Endpoint]) {
    for endpoint in endpoints {
        xml.push_str(&format!("<md:{local_name}"));
        push_attr(xml, "Binding", Some(endpoint.binding.uri()));
        push_attr(xml, "Location", Some(&endpoint.location));
        push_attr(xml, "ResponseLocation", endpoint.response_location.as_deref());
        if let Some(index) = endpoint.index {
            xml.push_str(&format!(r#" index="{index}""#));
        }
        push_flag_attr(xml, "isDefault", endpoint.is_default);
        xml.push_str("/>");
    }
}

fn authn_request_fragment(request: &AuthnRequest) -> String {
    let mut xml = format!(r#"<samlp:AuthnRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml="{SAML_NS}""#);
    push_attr(&mut xml, "ID", Some(&request.id));
    push_attr(&mut xml, "Version", Some(&request.version));
    push_instant_attr(&mut xml, "IssueInstant", Some(&request.issue_instant));
    push_attr(&mut xml, "Destination", request.destination.as_deref());
    push_attr(
        &mut xml,
        "AssertionConsumerServiceURL",
        request.assertion_consumer_service_url.as_deref(),
    );
    if let Some(index) = request.assertion_consumer_service_index {
        xml.push_str(&format!(r#" AssertionConsumerServiceIndex="{index}""#));
    }
    push_attr(&mut xml, "ProtocolBinding", request.protocol_binding.as_deref());
    push_flag_attr(&mut xml, "ForceAuthn", request.force_authn);
    push_flag_attr(&mut xml, "IsPassive", request.is_passive);
    push_attr(&mut xml, "ProviderName", request.provider_name.as_deref());
    push_attr(&mut xml, "Consent", request.consent.as_deref());
    xml.push('>');

    issuer_fragment(&mut xml, &request.issuer);

    if let Some(policy) = &request.name_id_policy {
        xml.push_str("<samlp:NameIDPolicy");
        push_attr(&mut xml, "Format", policy.format.as_deref());
        push_attr(&mut xml, "SPNameQualifier", policy.sp_name_qualifier.as_deref());
        xml.push_str(&format!(r#" AllowCreate="{}""#, policy.allow_create));
        xml.push_str("/>");
    }

    if let Some(context) = &request.requested_authn_context {
        xml.push_str(&format!(
            r#"<samlp:RequestedAuthnContext Comparison="{}">"#,
            context.comparison.as_str()
        ));
        for class_ref in &context.class_refs {
            xml.push_str("<saml:AuthnContextClassRef>");
            xml.push_str(&esc(class_ref));
            xml.push_str("</saml:AuthnContextClassRef>");
        }
        xml.push_str("</samlp:RequestedAuthnContext>");
    }

    xml.push_str("</samlp:AuthnRequest>");
    xml
}

fn assertion_fragment(assertion: &Assertion) -> String {
    let mut xml = format!(r#"<saml:Assertion xmlns:saml="{SAML_NS}""#);
    push_attr(&mut xml, "ID", Some(&assertion.id));
    push_attr(&mut xml, "Version", Some(&assertion.version));
    push_instant_attr(&mut xml, "IssueInstant", Some(&assertion.issue_instant));
    xml.push('>');

    issuer_fragment(&mut xml, &assertion.issuer);

    if let Some(subject) = &assertion.subject {
        xml.push_str("<saml:Subject>");
        if let Some(name_id) = &subject.name_id {
            name_id_fragment(&mut xml, name_id);
        }
        for confirmation in &subject.confirmations {
            xml.push_str("<saml:SubjectConfirmation");
            push_attr(&mut xml, "Method", Some(&confirmation.method));
            xml.push('>');
            if let Some(name_id) = &confirmation.name_id {
                name_id_fragment(&mut xml, name_id);
            }
            if let Some(data) = &confirmation.data {
                xml.push_str("<saml:SubjectConfirmationData");
                push_attr(&mut xml, "InResponseTo", data.in_response_to.as_deref());
                push_instant_attr(&mut xml, "NotBefore", data.not_before.as_ref());
                push_instant_attr(&mut xml, "NotOnOrAfter", data.not_on_or_after.as_ref());
                push_attr(&mut xml, "Recipient", data.recipient.as_deref());
                xml.push_str("/>");
            }
            xml.push_str("</saml:SubjectConfirmation>");
        }
        xml.push_str("</saml:Subject>");
    }

    if let Some(conditions) = &assertion.conditions {
        xml.push_str("<saml:Conditions");
        push_instant_attr(&mut xml, "NotBefore", conditions.not_before.as_ref());
        push_instant_attr(&mut xml, "NotOnOrAfter", conditions.not_on_or_after.as_ref());
        xml.push('>');
        for restriction in &conditions.audience_restrictions {
            xml.push_str("<saml:AudienceRestriction>");
            for audience in &restriction.audiences {
                xml.push_str("<saml:Audience>");
                xml.push_str(&esc(audience));
                xml.push_str("</saml:Audience>");
            }
            xml.push_str("</saml:AudienceRestriction>");
        }
        if conditions.one_time_use {
            xml.push_str("<saml:OneTimeUse/>");
        }
        xml.push_str("</saml:Conditions>");
    }

    for statement in &assertion.authn_statements {
        xml.push_str("<saml:AuthnStatement");
        push_instant_attr(&mut xml, "AuthnInstant", Some(&statement.authn_instant));
        push_attr(&mut xml, "SessionIndex", statement.session_index.as_deref());
        push_instant_attr(
            &mut xml,
            "SessionNotOnOrAfter",
            statement.session_not_on_or_after.as_ref(),
        );
        xml.push('>');
        if let Some(class_ref) = &statement.authn_context_class_ref {
            xml.push_str("<saml:AuthnContext><saml:AuthnContextClassRef>");
            xml.push_str(&esc(class_ref));
            xml.push_str("</saml:AuthnContextClassRef></saml:AuthnContext>");
        }
        xml.push_str("</saml:AuthnStatement>");
    }

    if !assertion.attributes.is_empty() {
        xml.push_str("<saml:AttributeStatement>");
        for attribute in &assertion.attributes {
            xml.push_str("<saml:Attribute");
            push_attr(&mut xml, "Name", Some(&attribute.name));
            push_attr(&mut xml, "FriendlyName", attribute.friendly_name.as_deref());
            push_attr(&mut xml, "NameFormat", attribute.name_format.as_deref());
            xml.push('>');
            for value in &attribute.values {
                xml.push_str("<saml:AttributeValue>");
                xml.push_str(&esc(value));
                xml.push_str("</saml:AttributeValue>");
            }
            xml.push_str("</saml:Attribute>");
        }
        xml.push_str("</saml:AttributeStatement>");
    }

    xml.push_str("</saml:Assertion>");
    xml
}

fn issuer_fragment(xml: &mut String, issuer: &Issuer) {
    xml.push_str("<saml:Issuer");
    push_attr(xml, "Format", issuer.format.as_deref());
    push_attr(xml, "NameQualifier", issuer.name_qualifier.as_deref());
    push_attr(xml, "SPNameQualifier", issuer.sp_name_qualifier.as_deref());
    xml.push('>');
    xml.push_str(&esc(&issuer.value));
    xml.push_str("</saml:Issuer>");
}

fn name_id_fragment(xml: &mut String, name_id: &NameId) {
    xml.push_str("<saml:NameID");
    push_attr(xml, "Format", name_id.format.as_deref());
    push_attr(xml, "NameQualifier", name_id.name_qualifier.as_deref());
    push_attr(xml, "SPNameQualifier", name_id.sp_name_qualifier.as_deref());
    push_attr(xml, "SPProvidedID", name_id.sp_provided_id.as_deref());
    xml.push('>');
    xml.push_str(&esc(&name_id.value));
    xml.push_str("</saml:NameID>");
}

fn push_attr(xml: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        xml.push_str(&format!(r#" {name}="{}""#, esc(value)));
    }
}

fn push_flag_attr(xml: &mut String, name: &str, value: bool) {
    if value {
        xml.push_str(&format!(r#" {name}="true""#));
    }
}

fn push_list_attr(xml: &mut String, name: &str, values: &[String]) {
    if !values.is_empty() {
        xml.push_str(&format!(r#" {name}="{}""#, esc(&values.join(" "))));
    }
}

fn push_instant_attr(xml: &mut String, name: &str, value: Option<&DateTime<Utc>>) {
    if let Some(value) = value {
        xml.push_str(&format!(
            r#" {name}="{}""#,
            value.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
    }
}

fn esc(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
