//! XML to domain mapping.
//!
//! Structural translation from a parsed document tree into domain
//! entities. Every node type that can carry a signature locates its own
//! `<ds:Signature>` child and pairs it with the validated record through
//! the document's signature map — the map is built once per document, and
//! is never rebuilt per sub-object.

use chrono::{DateTime, Utc};

use samling_xml::{child_text, find_child_element, find_child_elements};

use crate::error::{SamlError, SamlResult};
use crate::signature::resolver::{assign_signature, own_signature_element};
use crate::signature::SignatureMap;
use crate::types::{
    entity_alias_for, Assertion, Attribute, AudienceRestriction, AuthnContextComparison,
    AuthnRequest, AuthnStatement, Conditions, EntitiesCollection, Endpoint, IdpDescriptor, Issuer,
    KeyDescriptor, KeyUse, Metadata, NameId, NameIdPolicy, Provider, RequestedAttribute,
    RequestedAuthnContext, SamlBinding, SamlObject, SpDescriptor, Subject, SubjectConfirmation,
    SubjectConfirmationData, MD_NS, SAMLP_NS, SAML_NS, XMLDSIG_NS,
};

/// Maps a parsed document to its domain object.
///
/// Signature state comes exclusively from `signature_map`; recognized but
/// unimplemented kinds (responses, logout messages) are reported by name.
pub fn read_document(
    tree: &roxmltree::Document<'_>,
    signature_map: &SignatureMap,
) -> SamlResult<SamlObject> {
    let root = tree.root_element();
    let name = root.tag_name().name();
    let ns = root.tag_name().namespace().unwrap_or("");

    match (ns, name) {
        (MD_NS, "EntityDescriptor") => Ok(SamlObject::Metadata(read_metadata(root, signature_map)?)),
        (MD_NS, "EntitiesDescriptor") => Ok(SamlObject::EntitiesCollection(read_entities(
            root,
            signature_map,
        )?)),
        (SAMLP_NS, "AuthnRequest") => Ok(SamlObject::AuthnRequest(read_authn_request(
            root,
            signature_map,
        )?)),
        (SAML_NS, "Assertion") => Ok(SamlObject::Assertion(read_assertion(root, signature_map)?)),
        (SAMLP_NS, "Response") | (SAMLP_NS, "LogoutRequest") | (SAMLP_NS, "LogoutResponse") => {
            Err(SamlError::UnsupportedObjectKind(name.to_string()))
        }
        _ => Err(SamlError::UnsupportedObjectKind(format!("{{{ns}}}{name}"))),
    }
}

/// Maps an `<md:EntityDescriptor>` element.
pub fn read_metadata(
    node: roxmltree::Node<'_, '_>,
    signature_map: &SignatureMap,
) -> SamlResult<Metadata> {
    let entity_id = required_attribute(node, "entityID")?;

    let mut providers = Vec::new();
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().namespace() != Some(MD_NS) {
            continue;
        }
        match child.tag_name().name() {
            "SPSSODescriptor" => {
                providers.push(Provider::ServiceProvider(read_sp_descriptor(child)?));
            }
            "IDPSSODescriptor" => {
                providers.push(Provider::IdentityProvider(read_idp_descriptor(child)?));
            }
            _ => {}
        }
    }

    let mut metadata = Metadata {
        id: node.attribute("ID").map(str::to_owned),
        entity_alias: Some(entity_alias_for(&entity_id)),
        entity_id,
        valid_until: optional_instant(node, "validUntil")?,
        cache_duration: node.attribute("cacheDuration").map(str::to_owned),
        providers,
        signature: None,
        signing_key: None,
    };
    assign_signature(signature_map, &mut metadata, own_signature_element(node))?;
    Ok(metadata)
}

/// Maps an `<md:EntitiesDescriptor>` element.
pub fn read_entities(
    node: roxmltree::Node<'_, '_>,
    signature_map: &SignatureMap,
) -> SamlResult<EntitiesCollection> {
    let mut entities = Vec::new();
    for child in find_child_elements(node, MD_NS, "EntityDescriptor") {
        entities.push(read_metadata(child, signature_map)?);
    }

    let mut collection = EntitiesCollection {
        id: node.attribute("ID").map(str::to_owned),
        name: node.attribute("Name").map(str::to_owned),
        entities,
        signature: None,
    };
    assign_signature(signature_map, &mut collection, own_signature_element(node))?;
    Ok(collection)
}

fn read_sp_descriptor(node: roxmltree::Node<'_, '_>) -> SamlResult<SpDescriptor> {
    Ok(SpDescriptor {
        id: node.attribute("ID").map(str::to_owned),
        valid_until: optional_instant(node, "validUntil")?,
        cache_duration: node.attribute("cacheDuration").map(str::to_owned),
        protocol_support_enumeration: space_separated(node.attribute("protocolSupportEnumeration")),
        authn_requests_signed: bool_attribute(node, "AuthnRequestsSigned"),
        want_assertions_signed: bool_attribute(node, "WantAssertionsSigned"),
        name_id_formats: read_name_id_formats(node),
        key_descriptors: read_key_descriptors(node),
        assertion_consumer_services: read_endpoints(node, "AssertionConsumerService"),
        single_logout_services: read_endpoints(node, "SingleLogoutService"),
        artifact_resolution_services: read_endpoints(node, "ArtifactResolutionService"),
        requested_attributes: read_requested_attributes(node),
    })
}

fn read_idp_descriptor(node: roxmltree::Node<'_, '_>) -> SamlResult<IdpDescriptor> {
    Ok(IdpDescriptor {
        id: node.attribute("ID").map(str::to_owned),
        valid_until: optional_instant(node, "validUntil")?,
        cache_duration: node.attribute("cacheDuration").map(str::to_owned),
        protocol_support_enumeration: space_separated(node.attribute("protocolSupportEnumeration")),
        want_authn_requests_signed: bool_attribute(node, "WantAuthnRequestsSigned"),
        name_id_formats: read_name_id_formats(node),
        key_descriptors: read_key_descriptors(node),
        single_sign_on_services: read_endpoints(node, "SingleSignOnService"),
        single_logout_services: read_endpoints(node, "SingleLogoutService"),
        artifact_resolution_services: read_endpoints(node, "ArtifactResolutionService"),
    })
}

fn read_name_id_formats(node: roxmltree::Node<'_, '_>) -> Vec<String> {
    find_child_elements(node, MD_NS, "NameIDFormat")
        .into_iter()
        .filter_map(|n| n.text())
        .map(|t| t.trim().to_owned())
        .collect()
}

fn read_key_descriptors(node: roxmltree::Node<'_, '_>) -> Vec<KeyDescriptor> {
    let mut result = Vec::new();
    for descriptor in find_child_elements(node, MD_NS, "KeyDescriptor") {
        let Some(certificate) = child_text(descriptor, XMLDSIG_NS, "X509Certificate") else {
            continue;
        };
        result.push(KeyDescriptor {
            usage: KeyUse::from_str_opt(descriptor.attribute("use")),
            certificate: certificate.chars().filter(|c| !c.is_whitespace()).collect(),
        });
    }
    result
}

fn read_endpoints(node: roxmltree::Node<'_, '_>, local_name: &str) -> Vec<Endpoint> {
    let mut result = Vec::new();
    for service in find_child_elements(node, MD_NS, local_name) {
        let Some(binding_uri) = service.attribute("Binding") else {
            continue;
        };
        let Some(binding) = SamlBinding::from_uri(binding_uri) else {
            tracing::debug!(binding = binding_uri, "skipping endpoint with unsupported binding");
            continue;
        };
        let Some(location) = service.attribute("Location") else {
            continue;
        };
        result.push(Endpoint {
            binding,
            location: location.to_owned(),
            response_location: service.attribute("ResponseLocation").map(str::to_owned),
            index: service.attribute("index").and_then(|i| i.parse().ok()),
            is_default: service.attribute("isDefault") == Some("true"),
        });
    }
    result
}

fn read_requested_attributes(node: roxmltree::Node<'_, '_>) -> Vec<RequestedAttribute> {
    // only the first consuming service is considered
    let Some(service) = find_child_element(node, MD_NS, "AttributeConsumingService") else {
        return Vec::new();
    };
    find_child_elements(service, MD_NS, "RequestedAttribute")
        .into_iter()
        .filter_map(|attr| {
            Some(RequestedAttribute {
                name: attr.attribute("Name")?.to_owned(),
                friendly_name: attr.attribute("FriendlyName").map(str::to_owned),
                name_format: attr.attribute("NameFormat").map(str::to_owned),
                required: attr.attribute("isRequired") == Some("true"),
            })
        })
        .collect()
}

/// Maps a `<samlp:AuthnRequest>` element.
pub fn read_authn_request(
    node: roxmltree::Node<'_, '_>,
    signature_map: &SignatureMap,
) -> SamlResult<AuthnRequest> {
    let mut request = AuthnRequest {
        id: required_attribute(node, "ID")?,
        version: node.attribute("Version").unwrap_or("2.0").to_owned(),
        issue_instant: required_instant(node, "IssueInstant")?,
        issuer: read_issuer(node)?,
        assertion_consumer_service_url: node
            .attribute("AssertionConsumerServiceURL")
            .map(str::to_owned),
        assertion_consumer_service_index: node
            .attribute("AssertionConsumerServiceIndex")
            .and_then(|i| i.parse().ok()),
        destination: node.attribute("Destination").map(str::to_owned),
        protocol_binding: node.attribute("ProtocolBinding").map(str::to_owned),
        name_id_policy: read_name_id_policy(node),
        requested_authn_context: read_requested_authn_context(node),
        force_authn: bool_attribute(node, "ForceAuthn"),
        is_passive: bool_attribute(node, "IsPassive"),
        provider_name: node.attribute("ProviderName").map(str::to_owned),
        consent: node.attribute("Consent").map(str::to_owned),
        signature: None,
        signing_key: None,
    };
    assign_signature(signature_map, &mut request, own_signature_element(node))?;
    Ok(request)
}

fn read_name_id_policy(node: roxmltree::Node<'_, '_>) -> Option<NameIdPolicy> {
    let policy = find_child_element(node, SAMLP_NS, "NameIDPolicy")?;
    Some(NameIdPolicy {
        format: policy.attribute("Format").map(str::to_owned),
        sp_name_qualifier: policy.attribute("SPNameQualifier").map(str::to_owned),
        allow_create: policy.attribute("AllowCreate") == Some("true"),
    })
}

fn read_requested_authn_context(node: roxmltree::Node<'_, '_>) -> Option<RequestedAuthnContext> {
    let context = find_child_element(node, SAMLP_NS, "RequestedAuthnContext")?;
    Some(RequestedAuthnContext {
        comparison: context
            .attribute("Comparison")
            .and_then(AuthnContextComparison::from_str_opt)
            .unwrap_or_default(),
        class_refs: find_child_elements(context, SAML_NS, "AuthnContextClassRef")
            .into_iter()
            .filter_map(|n| n.text())
            .map(|t| t.trim().to_owned())
            .collect(),
    })
}

/// Maps a `<saml:Assertion>` element.
pub fn read_assertion(
    node: roxmltree::Node<'_, '_>,
    signature_map: &SignatureMap,
) -> SamlResult<Assertion> {
    let mut authn_statements = Vec::new();
    for statement in find_child_elements(node, SAML_NS, "AuthnStatement") {
        authn_statements.push(read_authn_statement(statement)?);
    }

    let mut attributes = Vec::new();
    for statement in find_child_elements(node, SAML_NS, "AttributeStatement") {
        for attribute in find_child_elements(statement, SAML_NS, "Attribute") {
            let Some(name) = attribute.attribute("Name") else {
                continue;
            };
            attributes.push(Attribute {
                name: name.to_owned(),
                friendly_name: attribute.attribute("FriendlyName").map(str::to_owned),
                name_format: attribute.attribute("NameFormat").map(str::to_owned),
                values: find_child_elements(attribute, SAML_NS, "AttributeValue")
                    .into_iter()
                    .map(|n| n.text().unwrap_or("").to_owned())
                    .collect(),
            });
        }
    }

    let mut assertion = Assertion {
        id: required_attribute(node, "ID")?,
        version: node.attribute("Version").unwrap_or("2.0").to_owned(),
        issue_instant: required_instant(node, "IssueInstant")?,
        issuer: read_issuer(node)?,
        subject: read_subject(node)?,
        conditions: read_conditions(node)?,
        authn_statements,
        attributes,
        signature: None,
        signing_key: None,
    };
    assign_signature(signature_map, &mut assertion, own_signature_element(node))?;
    Ok(assertion)
}

fn read_subject(node: roxmltree::Node<'_, '_>) -> SamlResult<Option<Subject>> {
    let Some(subject) = find_child_element(node, SAML_NS, "Subject") else {
        return Ok(None);
    };

    let name_id = find_child_element(subject, SAML_NS, "NameID").map(read_name_id);

    let mut confirmations = Vec::new();
    for confirmation in find_child_elements(subject, SAML_NS, "SubjectConfirmation") {
        let method = confirmation
            .attribute("Method")
            .ok_or_else(|| SamlError::MissingAttribute("SubjectConfirmation/@Method".to_string()))?
            .to_owned();

        let data = match find_child_element(confirmation, SAML_NS, "SubjectConfirmationData") {
            Some(data) => Some(SubjectConfirmationData {
                in_response_to: data.attribute("InResponseTo").map(str::to_owned),
                not_before: optional_instant(data, "NotBefore")?,
                not_on_or_after: optional_instant(data, "NotOnOrAfter")?,
                recipient: data.attribute("Recipient").map(str::to_owned),
            }),
            None => None,
        };

        confirmations.push(SubjectConfirmation {
            method,
            name_id: find_child_element(confirmation, SAML_NS, "NameID").map(read_name_id),
            data,
        });
    }

    Ok(Some(Subject {
        name_id,
        confirmations,
    }))
}

fn read_conditions(node: roxmltree::Node<'_, '_>) -> SamlResult<Option<Conditions>> {
    let Some(conditions) = find_child_element(node, SAML_NS, "Conditions") else {
        return Ok(None);
    };

    let mut audience_restrictions = Vec::new();
    for restriction in find_child_elements(conditions, SAML_NS, "AudienceRestriction") {
        audience_restrictions.push(AudienceRestriction {
            audiences: find_child_elements(restriction, SAML_NS, "Audience")
                .into_iter()
                .filter_map(|n| n.text())
                .map(|t| t.trim().to_owned())
                .collect(),
        });
    }

    Ok(Some(Conditions {
        not_before: optional_instant(conditions, "NotBefore")?,
        not_on_or_after: optional_instant(conditions, "NotOnOrAfter")?,
        audience_restrictions,
        one_time_use: find_child_element(conditions, SAML_NS, "OneTimeUse").is_some(),
    }))
}

fn read_authn_statement(node: roxmltree::Node<'_, '_>) -> SamlResult<AuthnStatement> {
    Ok(AuthnStatement {
        authn_instant: required_instant(node, "AuthnInstant")?,
        session_index: node.attribute("SessionIndex").map(str::to_owned),
        session_not_on_or_after: optional_instant(node, "SessionNotOnOrAfter")?,
        authn_context_class_ref: child_text(node, SAML_NS, "AuthnContextClassRef")
            .map(|t| t.trim().to_owned()),
    })
}

fn read_issuer(node: roxmltree::Node<'_, '_>) -> SamlResult<Issuer> {
    let issuer = find_child_element(node, SAML_NS, "Issuer")
        .ok_or_else(|| SamlError::MissingElement("Issuer".to_string()))?;
    Ok(Issuer {
        value: issuer.text().unwrap_or("").trim().to_owned(),
        format: issuer.attribute("Format").map(str::to_owned),
        name_qualifier: issuer.attribute("NameQualifier").map(str::to_owned),
        sp_name_qualifier: issuer.attribute("SPNameQualifier").map(str::to_owned),
    })
}

fn read_name_id(node: roxmltree::Node<'_, '_>) -> NameId {
    NameId {
        value: node.text().unwrap_or("").trim().to_owned(),
        format: node.attribute("Format").map(str::to_owned),
        name_qualifier: node.attribute("NameQualifier").map(str::to_owned),
        sp_name_qualifier: node.attribute("SPNameQualifier").map(str::to_owned),
        sp_provided_id: node.attribute("SPProvidedID").map(str::to_owned),
    }
}

fn required_attribute(node: roxmltree::Node<'_, '_>, name: &str) -> SamlResult<String> {
    node.attribute(name).map(str::to_owned).ok_or_else(|| {
        SamlError::MissingAttribute(format!("{}/@{name}", node.tag_name().name()))
    })
}

fn required_instant(node: roxmltree::Node<'_, '_>, name: &str) -> SamlResult<DateTime<Utc>> {
    let value = required_attribute(node, name)?;
    parse_instant(&value, name)
}

fn optional_instant(
    node: roxmltree::Node<'_, '_>,
    name: &str,
) -> SamlResult<Option<DateTime<Utc>>> {
    node.attribute(name)
        .map(|value| parse_instant(value, name))
        .transpose()
}

fn parse_instant(value: &str, attr: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SamlError::XmlParse(format!("invalid {attr} timestamp '{value}': {e}")))
}

fn bool_attribute(node: roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.attribute(name) == Some("true")
}

fn space_separated(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}
