//! Verb dispatch: which action a resource performs for a given HTTP verb.
//!
//! Browsers and simple clients can only send GET and POST, so comment-accepting
//! resources also honour a `_method=PUT|DELETE` query parameter on POST.

use std::fmt;

use axum::http::Method;
use thiserror::Error;

use crate::application::routing::ResourceKind;
use crate::domain::types::Role;

pub const METHOD_OVERRIDE_PARAM: &str = "_method";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn from_method(method: &Method) -> Option<Self> {
        if *method == Method::GET || *method == Method::HEAD {
            Some(Verb::Get)
        } else if *method == Method::POST {
            Some(Verb::Post)
        } else if *method == Method::PUT {
            Some(Verb::Put)
        } else if *method == Method::DELETE {
            Some(Verb::Delete)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    fn from_override(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PUT" => Some(Verb::Put),
            "DELETE" => Some(Verb::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether POSTs to this kind of resource may be re-targeted through the query string.
pub fn allows_method_override(kind: ResourceKind) -> bool {
    matches!(kind, ResourceKind::Article | ResourceKind::BlogEntry)
}

/// Resolve the verb a request should be dispatched as, honouring overrides.
///
/// `override_value` is the value of the `_method` query parameter, if any.
pub fn effective_verb(
    method: &Method,
    override_value: Option<&str>,
    kind: ResourceKind,
) -> Option<Verb> {
    let verb = Verb::from_method(method)?;
    if verb != Verb::Post || !allows_method_override(kind) {
        return Some(verb);
    }

    Some(
        override_value
            .and_then(Verb::from_override)
            .unwrap_or(Verb::Post),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListBlogEntries,
    ListYear,
    ListMonth,
    ListTag,
    Search,
    AtomFeed,
    ShowArticle,
    ShowNotFoundPage,
    ShowUnauthorizedPage,
    CreateArticle,
    CreateBlogEntry,
    AddComment,
    EditArticle,
    DeleteArticle,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::ListBlogEntries => "list_blog_entries",
            Operation::ListYear => "list_year",
            Operation::ListMonth => "list_month",
            Operation::ListTag => "list_tag",
            Operation::Search => "search",
            Operation::AtomFeed => "atom_feed",
            Operation::ShowArticle => "show_article",
            Operation::ShowNotFoundPage => "show_not_found_page",
            Operation::ShowUnauthorizedPage => "show_unauthorized_page",
            Operation::CreateArticle => "create_article",
            Operation::CreateBlogEntry => "create_blog_entry",
            Operation::AddComment => "add_comment",
            Operation::EditArticle => "edit_article",
            Operation::DeleteArticle => "delete_article",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action {
    pub operation: Operation,
    pub required_role: Option<Role>,
}

impl Action {
    const fn open(operation: Operation) -> Self {
        Self {
            operation,
            required_role: None,
        }
    }

    const fn guarded(operation: Operation, role: Role) -> Self {
        Self {
            operation,
            required_role: Some(role),
        }
    }

    pub fn name(&self) -> &'static str {
        self.operation.as_str()
    }

    pub fn mutates(&self) -> bool {
        matches!(
            self.operation,
            Operation::CreateArticle
                | Operation::CreateBlogEntry
                | Operation::AddComment
                | Operation::EditArticle
                | Operation::DeleteArticle
        )
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{verb} is not supported on {kind} resources")]
pub struct MethodNotAllowed {
    pub kind: ResourceKind,
    pub verb: Verb,
    pub allowed: Vec<Verb>,
}

impl MethodNotAllowed {
    /// Value for the `Allow` response header.
    pub fn allow_header(&self) -> String {
        allow_header_value(&self.allowed)
    }
}

/// Render verbs as an `Allow` header value; GET implies HEAD.
pub fn allow_header_value(allowed: &[Verb]) -> String {
    let mut names: Vec<&str> = Vec::with_capacity(allowed.len() + 1);
    for verb in allowed {
        names.push(verb.as_str());
        if *verb == Verb::Get {
            names.push("HEAD");
        }
    }
    names.join(", ")
}

const ALL_VERBS: [Verb; 4] = [Verb::Get, Verb::Post, Verb::Put, Verb::Delete];

fn lookup(kind: ResourceKind, verb: Verb) -> Option<Action> {
    use Operation::*;

    let action = match (kind, verb) {
        (ResourceKind::Root, Verb::Get) => Action::open(ListBlogEntries),
        (ResourceKind::Root, Verb::Post) => Action::guarded(CreateArticle, Role::Admin),
        (ResourceKind::Article | ResourceKind::BlogEntry, Verb::Get) => Action::open(ShowArticle),
        (ResourceKind::Article | ResourceKind::BlogEntry, Verb::Post) => {
            Action::guarded(AddComment, Role::User)
        }
        (ResourceKind::Article | ResourceKind::BlogEntry, Verb::Put) => {
            Action::guarded(EditArticle, Role::Admin)
        }
        (ResourceKind::Article | ResourceKind::BlogEntry, Verb::Delete) => {
            Action::guarded(DeleteArticle, Role::Admin)
        }
        (ResourceKind::Year, Verb::Get) => Action::open(ListYear),
        (ResourceKind::Month, Verb::Get) => Action::open(ListMonth),
        (ResourceKind::Month, Verb::Post) => Action::guarded(CreateBlogEntry, Role::Admin),
        (ResourceKind::Tag, Verb::Get) => Action::open(ListTag),
        (ResourceKind::Search, Verb::Get) => Action::open(Search),
        (ResourceKind::Atom, Verb::Get) => Action::open(AtomFeed),
        (ResourceKind::NotFoundPage, Verb::Get) => Action::open(ShowNotFoundPage),
        (ResourceKind::UnauthorizedPage, Verb::Get) => Action::open(ShowUnauthorizedPage),
        _ => return None,
    };
    Some(action)
}

/// Map a resource kind and verb to the action handling it.
pub fn action_for(kind: ResourceKind, verb: Verb) -> Result<Action, MethodNotAllowed> {
    lookup(kind, verb).ok_or_else(|| MethodNotAllowed {
        kind,
        verb,
        allowed: allowed_verbs(kind),
    })
}

/// Verbs with an action on this kind of resource.
pub fn allowed_verbs(kind: ResourceKind) -> Vec<Verb> {
    ALL_VERBS
        .into_iter()
        .filter(|candidate| lookup(kind, *candidate).is_some())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_can_be_overridden_on_articles() {
        assert_eq!(
            effective_verb(&Method::POST, Some("put"), ResourceKind::Article),
            Some(Verb::Put)
        );
        assert_eq!(
            effective_verb(&Method::POST, Some("DELETE"), ResourceKind::BlogEntry),
            Some(Verb::Delete)
        );
    }

    #[test]
    fn unknown_override_values_keep_post() {
        assert_eq!(
            effective_verb(&Method::POST, Some("PATCH"), ResourceKind::Article),
            Some(Verb::Post)
        );
        assert_eq!(
            effective_verb(&Method::POST, None, ResourceKind::Article),
            Some(Verb::Post)
        );
    }

    #[test]
    fn overrides_are_ignored_where_not_allowed() {
        assert_eq!(
            effective_verb(&Method::GET, Some("DELETE"), ResourceKind::Article),
            Some(Verb::Get)
        );
        assert_eq!(
            effective_verb(&Method::POST, Some("DELETE"), ResourceKind::Root),
            Some(Verb::Post)
        );
        assert_eq!(
            effective_verb(&Method::POST, Some("PUT"), ResourceKind::Month),
            Some(Verb::Post)
        );
    }

    #[test]
    fn head_is_served_as_get_and_patch_is_unknown() {
        assert_eq!(
            effective_verb(&Method::HEAD, None, ResourceKind::Root),
            Some(Verb::Get)
        );
        assert_eq!(
            effective_verb(&Method::PATCH, None, ResourceKind::Root),
            None
        );
    }

    #[test]
    fn writes_require_roles() {
        let create = action_for(ResourceKind::Root, Verb::Post).unwrap();
        assert_eq!(create.operation, Operation::CreateArticle);
        assert_eq!(create.required_role, Some(Role::Admin));

        let comment = action_for(ResourceKind::BlogEntry, Verb::Post).unwrap();
        assert_eq!(comment.operation, Operation::AddComment);
        assert_eq!(comment.required_role, Some(Role::User));

        let read = action_for(ResourceKind::Tag, Verb::Get).unwrap();
        assert_eq!(read.required_role, None);
        assert!(!read.mutates());
    }

    #[test]
    fn unsupported_verbs_list_allowed_ones() {
        let err = action_for(ResourceKind::Month, Verb::Delete).unwrap_err();
        assert_eq!(err.allowed, vec![Verb::Get, Verb::Post]);
        assert_eq!(err.allow_header(), "GET, HEAD, POST");

        let err = action_for(ResourceKind::Atom, Verb::Put).unwrap_err();
        assert_eq!(err.allow_header(), "GET, HEAD");
    }
}
