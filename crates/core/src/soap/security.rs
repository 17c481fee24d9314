use quick_xml::Reader;
use quick_xml::events::Event;

/// Result of inspecting a request's WS-Security `UsernameToken`.
///
/// Callers admit the request in every case; many NVR clients send no
/// credentials or digest-only credentials on their first calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCheck {
    /// No `UsernameToken` present.
    Anonymous,
    /// Plain-text credentials that match the configured user.
    Accepted,
    /// Credentials present but not verified (wrong, or a digest).
    Unverified { username: String },
}

/// Inspect a request's `UsernameToken` against the configured credentials.
pub fn check_credentials(body: &[u8], username: &str, password: &str) -> AuthCheck {
    let Some(token) = username_token(body) else {
        return AuthCheck::Anonymous;
    };

    if token.username.as_deref() == Some(username)
        && token.password.as_deref() == Some(password)
        && !token.digest
    {
        return AuthCheck::Accepted;
    }

    AuthCheck::Unverified {
        username: token.username.unwrap_or_default(),
    }
}

#[derive(Default)]
struct UsernameToken {
    username: Option<String>,
    password: Option<String>,
    digest: bool,
}

enum Field {
    Username,
    Password,
}

fn username_token(body: &[u8]) -> Option<UsernameToken> {
    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();
    let mut token: Option<UsernameToken> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"UsernameToken" => token = Some(UsernameToken::default()),
                b"Username" if token.is_some() => field = Some(Field::Username),
                b"Password" if token.is_some() => {
                    let digest = e.attributes().flatten().any(|a| {
                        a.key.local_name().as_ref() == b"Type"
                            && a.value.as_ref().ends_with(b"#PasswordDigest")
                    });
                    if let Some(t) = token.as_mut() {
                        t.digest = digest;
                    }
                    field = Some(Field::Password);
                }
                _ => {}
            },
            Ok(Event::Text(text)) => {
                if let (Some(f), Some(t)) = (&field, token.as_mut()) {
                    let value = text.unescape().map(|v| v.trim().to_string()).ok();
                    match f {
                        Field::Username => t.username = value,
                        Field::Password => t.password = value,
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"UsernameToken" {
                    return token;
                }
                field = None;
            }
            Ok(Event::Eof) | Err(_) => return token,
            Ok(_) => {}
        }
        buf.clear();
    }
}
