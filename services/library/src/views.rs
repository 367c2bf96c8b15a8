//! Server-rendered pages
//!
//! Every page has its own view struct filled by a handler. Text coming from
//! users is escaped when the page is rendered.

use std::fmt::Write as _;

use axum::response::Html;

use crate::formats::{BookContent, format_file_size};
use crate::models::{Book, SortOrder, UserProfile};

/// Escape text for use in HTML content and attribute values
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// A page rendered inside the common layout
pub trait View {
    fn title(&self) -> String;

    /// Signed-in user shown in the navigation bar
    fn user(&self) -> Option<&UserProfile>;

    /// Page content, already escaped
    fn body(&self) -> String;

    fn render(&self) -> Html<String> {
        let nav = match self.user() {
            Some(user) => format!(
                r#"<a href="/upload">Upload</a> <a href="/profile">{}</a>
<form method="post" action="/logout" class="inline"><button type="submit">Log out</button></form>"#,
                escape(&user.username)
            ),
            None => r#"<a href="/login">Log in</a> <a href="/register">Register</a>"#.to_string(),
        };

        Html(format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title} - Bookshelf</title></head>
<body>
<nav><a href="/">Bookshelf</a> <a href="/search">Search</a> {nav}</nav>
<main>
{body}
</main>
</body>
</html>"#,
            title = escape(&self.title()),
            nav = nav,
            body = self.body(),
        ))
    }
}

fn error_block(error: &Option<String>) -> String {
    error
        .as_ref()
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape(message)))
        .unwrap_or_default()
}

fn book_card(book: &Book) -> String {
    let cover = match &book.cover_image {
        Some(_) => format!(
            r#"<img src="/books/{}/cover" alt="" class="cover">"#,
            book.id
        ),
        None => String::new(),
    };

    format!(
        r#"<li class="book">{cover}<a href="/books/{id}">{title}</a> by {author} <span class="rating">{rating:.1} ({count})</span></li>"#,
        cover = cover,
        id = book.id,
        title = escape(&book.title),
        author = escape(&book.author),
        rating = book.rating,
        count = book.rating_count,
    )
}

fn book_list(books: &[Book]) -> String {
    if books.is_empty() {
        return "<p>No books found.</p>".to_string();
    }

    let mut html = String::from("<ul class=\"books\">");
    for book in books {
        html.push_str(&book_card(book));
    }
    html.push_str("</ul>");
    html
}

fn tag_links(tags: &[&str]) -> String {
    tags.iter()
        .map(|tag| {
            format!(
                r#"<a class="tag" href="/search?tags={}">{}</a>"#,
                urlencoding::encode(tag),
                escape(tag)
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Home page and search results
pub struct IndexView {
    pub user: Option<UserProfile>,
    pub books: Vec<Book>,
    pub query: String,
    pub tags: Vec<String>,
    pub sort: SortOrder,
    pub popular_tags: Vec<String>,
    /// Render the search form
    pub is_search: bool,
}

impl View for IndexView {
    fn title(&self) -> String {
        if self.is_search {
            "Search".to_string()
        } else {
            "Latest books".to_string()
        }
    }

    fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    fn body(&self) -> String {
        let mut html = format!("<h1>{}</h1>", escape(&self.title()));

        if self.is_search {
            let options = [SortOrder::Newest, SortOrder::Rating, SortOrder::Popular]
                .iter()
                .map(|sort| {
                    let selected = if *sort == self.sort { " selected" } else { "" };
                    format!(r#"<option value="{0}"{1}>{0}</option>"#, sort.as_str(), selected)
                })
                .collect::<String>();

            let _ = write!(
                html,
                r#"<form method="get" action="/search">
<input type="text" name="q" value="{query}">
<input type="text" name="tags" value="{tags}" placeholder="tag1,tag2">
<select name="sort">{options}</select>
<button type="submit">Search</button>
</form>"#,
                query = escape(&self.query),
                tags = escape(&self.tags.join(",")),
                options = options,
            );

            if !self.popular_tags.is_empty() {
                let tags: Vec<&str> = self.popular_tags.iter().map(String::as_str).collect();
                let _ = write!(html, r#"<p class="tags">{}</p>"#, tag_links(&tags));
            }
        }

        html.push_str(&book_list(&self.books));
        html
    }
}

/// Single book page
pub struct BookDetailView {
    pub user: Option<UserProfile>,
    pub book: Book,
    /// The signed-in user's rating, 0 when unrated or anonymous
    pub user_rating: i64,
}

impl View for BookDetailView {
    fn title(&self) -> String {
        self.book.title.clone()
    }

    fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    fn body(&self) -> String {
        let book = &self.book;
        let mut html = String::new();

        if book.cover_image.is_some() {
            let _ = write!(html, r#"<img src="/books/{}/cover" alt="Cover">"#, book.id);
        }

        let _ = write!(
            html,
            r#"<h1>{title}</h1>
<p>by {author}, uploaded by {owner} on {date}</p>
<p>{description}</p>
<p class="tags">{tags}</p>
<p>{filename} ({size})</p>
<p class="rating">Rating: {rating:.1} from {count} ratings</p>
<p><a href="/books/{id}/read">Read</a> <a href="/books/{id}/download">Download</a></p>"#,
            title = escape(&book.title),
            author = escape(&book.author),
            owner = escape(&book.username),
            date = book.created_at.format("%Y-%m-%d"),
            description = escape(&book.description),
            tags = tag_links(&book.tag_list()),
            filename = escape(&book.filename),
            size = format_file_size(book.file_size),
            rating = book.rating,
            count = book.rating_count,
            id = book.id,
        );

        if let Some(user) = &self.user {
            let options = (1..=5)
                .map(|value| {
                    let selected = if value == self.user_rating { " selected" } else { "" };
                    format!(r#"<option value="{0}"{1}>{0}</option>"#, value, selected)
                })
                .collect::<String>();

            let _ = write!(
                html,
                r#"<form method="post" action="/books/{id}/rate">
<select name="rating">{options}</select>
<button type="submit">Rate</button>
</form>"#,
                id = book.id,
                options = options,
            );

            if book.is_owned_by(user.id) {
                let _ = write!(
                    html,
                    r#"<p><a href="/books/{id}/edit">Edit</a></p>
<form method="post" action="/books/{id}/delete"><button type="submit">Delete</button></form>"#,
                    id = book.id
                );
            }
        }

        html
    }
}

/// In-browser reader
pub struct ReadBookView {
    pub user: Option<UserProfile>,
    pub book: Book,
    /// Readable content; `None` for formats that cannot be shown
    pub content: Option<BookContent>,
    pub can_edit: bool,
}

impl View for ReadBookView {
    fn title(&self) -> String {
        format!("Reading {}", self.book.title)
    }

    fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    fn body(&self) -> String {
        let book = &self.book;
        let mut html = format!(
            r#"<h1><a href="/books/{}">{}</a></h1>"#,
            book.id,
            escape(&book.title)
        );

        match &self.content {
            Some(content) => {
                match content {
                    BookContent::Text(text) => {
                        let _ = write!(html, r#"<pre class="content">{}</pre>"#, escape(text));
                    }
                    BookContent::Markup(markup) => {
                        let _ = write!(html, r#"<article class="content">{}</article>"#, markup);
                    }
                }
                if self.can_edit {
                    let _ = write!(html, r#"<p><a href="/books/{}/edit">Edit</a></p>"#, book.id);
                }
            }
            None => {
                let _ = write!(
                    html,
                    r#"<p>This format cannot be read in the browser. <a href="/books/{}/download">Download</a> it instead.</p>"#,
                    book.id
                );
            }
        }

        html
    }
}

/// The signed-in user's profile and uploads
pub struct ProfileView {
    pub user: UserProfile,
    pub books: Vec<Book>,
}

impl View for ProfileView {
    fn title(&self) -> String {
        self.user.username.clone()
    }

    fn user(&self) -> Option<&UserProfile> {
        Some(&self.user)
    }

    fn body(&self) -> String {
        let user = &self.user;
        let avatar = if user.avatar.is_empty() {
            format!(r#"<span class="avatar">{}</span>"#, escape(&user.initial()))
        } else {
            format!(r#"<img class="avatar" src="/users/{}/avatar" alt="">"#, user.id)
        };

        format!(
            r#"{avatar}<h1>{username}</h1>
<p>{email}, member since {date}</p>
<p><a href="/edit-profile">Edit profile</a></p>
<h2>My books</h2>
{books}"#,
            avatar = avatar,
            username = escape(&user.username),
            email = escape(&user.email),
            date = user.created_at.format("%Y-%m-%d"),
            books = book_list(&self.books),
        )
    }
}

/// Profile edit form
pub struct EditProfileView {
    pub user: UserProfile,
    pub error: Option<String>,
}

impl View for EditProfileView {
    fn title(&self) -> String {
        "Edit profile".to_string()
    }

    fn user(&self) -> Option<&UserProfile> {
        Some(&self.user)
    }

    fn body(&self) -> String {
        format!(
            r#"<h1>Edit profile</h1>
{error}
<form method="post" action="/update-profile" enctype="multipart/form-data">
<label>Username <input type="text" name="username" value="{username}"></label>
<label>Email <input type="email" name="email" value="{email}"></label>
<label>Current password <input type="password" name="current_password"></label>
<label>New password <input type="password" name="new_password"></label>
<label>Avatar <input type="file" name="avatar" accept="image/*"></label>
<button type="submit">Save</button>
</form>"#,
            error = error_block(&self.error),
            username = escape(&self.user.username),
            email = escape(&self.user.email),
        )
    }
}

/// Book upload form
pub struct UploadView {
    pub user: Option<UserProfile>,
    pub error: Option<String>,
}

impl View for UploadView {
    fn title(&self) -> String {
        "Upload a book".to_string()
    }

    fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    fn body(&self) -> String {
        format!(
            r#"<h1>Upload a book</h1>
{error}
<form method="post" action="/upload" enctype="multipart/form-data">
<label>Title <input type="text" name="title" required></label>
<label>Author <input type="text" name="author" required></label>
<label>Description <textarea name="description"></textarea></label>
<label>Tags <input type="text" name="tags" placeholder="tag1,tag2"></label>
<label>File <input type="file" name="book_file" required></label>
<label>Cover <input type="file" name="cover_image" accept="image/*"></label>
<button type="submit">Upload</button>
</form>"#,
            error = error_block(&self.error),
        )
    }
}

/// Book edit form for the owner
pub struct EditBookView {
    pub user: Option<UserProfile>,
    pub book: Book,
    /// Current file content when the format is editable
    pub content: Option<String>,
}

impl View for EditBookView {
    fn title(&self) -> String {
        format!("Edit {}", self.book.title)
    }

    fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    fn body(&self) -> String {
        let book = &self.book;
        let content = self
            .content
            .as_ref()
            .map(|content| {
                format!(
                    r#"<label>Content <textarea name="content" rows="30">{}</textarea></label>"#,
                    escape(content)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<h1>Edit <a href="/books/{id}">{title}</a></h1>
<form method="post" action="/books/{id}/update">
<label>Title <input type="text" name="title" value="{title}" required></label>
<label>Author <input type="text" name="author" value="{author}" required></label>
<label>Description <textarea name="description">{description}</textarea></label>
<label>Tags <input type="text" name="tags" value="{tags}"></label>
{content}
<button type="submit">Save</button>
</form>"#,
            id = book.id,
            title = escape(&book.title),
            author = escape(&book.author),
            description = escape(&book.description),
            tags = escape(&book.tags),
            content = content,
        )
    }
}

/// Which credentials form to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthForm {
    Login,
    Register,
}

/// Login and registration forms
pub struct AuthFormView {
    pub form: AuthForm,
    pub error: Option<String>,
    /// Values to keep after a failed attempt
    pub username: String,
    pub email: String,
}

impl AuthFormView {
    pub fn new(form: AuthForm) -> Self {
        Self {
            form,
            error: None,
            username: String::new(),
            email: String::new(),
        }
    }
}

impl View for AuthFormView {
    fn title(&self) -> String {
        match self.form {
            AuthForm::Login => "Log in".to_string(),
            AuthForm::Register => "Register".to_string(),
        }
    }

    fn user(&self) -> Option<&UserProfile> {
        None
    }

    fn body(&self) -> String {
        let (action, email) = match self.form {
            AuthForm::Login => ("/login", String::new()),
            AuthForm::Register => (
                "/register",
                format!(
                    r#"<label>Email <input type="email" name="email" value="{}" required></label>"#,
                    escape(&self.email)
                ),
            ),
        };

        format!(
            r#"<h1>{title}</h1>
{error}
<form method="post" action="{action}">
<label>Username <input type="text" name="username" value="{username}" required></label>
{email}
<label>Password <input type="password" name="password" required></label>
<button type="submit">{title}</button>
</form>"#,
            title = escape(&self.title()),
            error = error_block(&self.error),
            action = action,
            username = escape(&self.username),
            email = email,
        )
    }
}
