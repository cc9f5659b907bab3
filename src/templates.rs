//! Sample email templates for testing and demonstration.
//!
//! Each template exercises a different part of the build: EEx tags in text
//! and attributes, a shared layout, embedded styles and the grid shorthand.

/// Shared layout with a `{content}` slot, an embedded stylesheet and a media
/// query.
pub fn layout_template() -> &'static str {
    r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8"/>
    <title><%= @subject %></title>
    <style>
        body { margin: 0; background-color: #f3f3f3; }
        .wrapper { width: 100%; }
        .footer p { color: #8a8a8a; font-size: 12px; }
        @media only screen and (max-width: 600px) {
            .wrapper { width: 100% !important; }
        }
    </style>
</head>
<body>
    <table class="wrapper" width="600">
        <tr><td>{content}</td></tr>
    </table>
    <div class="footer"><p>Sent to <%= @user.email %></p></div>
</body>
</html>
"##
}

/// Plain welcome mail with tags in text.
pub fn welcome_template() -> &'static str {
    r##"<h1>Welcome, <%= @user.first_name %>!</h1>
<p>Thanks for signing up. Your account <strong><%= @user.email %></strong> is ready.</p>
<p>
    <a class="cta" href="<%= @confirm_url %>">Confirm your address</a>
</p>
"##
}

/// Receipt with a loop, tags inside attributes and an inline style override.
pub fn receipt_template() -> &'static str {
    r##"<style>
    .items td { padding: 4px 8px; }
    .items .price { text-align: right; }
    .total { font-weight: bold !important; }
</style>
<h2>Receipt #<%= @order.number %></h2>
<table class="items" width="100%">
    <% for item <- @order.items do %>
    <tr data-sku="<%= item.sku %>">
        <td><%= item.name %></td>
        <td class="price" style="color: #333"><%= item.price %></td>
    </tr>
    <% end %>
    <tr><td class="total" style="font-weight: normal">Total</td><td class="price"><%= @order.total %></td></tr>
</table>
<p>Questions? Reply to this mail &mdash; we read every one.</p>
"##
}

/// Foundation for Emails grid shorthand.
pub fn foundation_template() -> &'static str {
    r##"<container>
    <row>
        <columns small="12" large="6">
            <h3>Hi <%= @user.first_name %></h3>
            <p>Your weekly summary is here.</p>
        </columns>
        <columns small="12" large="6">
            <callout class="primary"><p><%= @stats.visits %> visits this week</p></callout>
        </columns>
    </row>
    <spacer size="24"></spacer>
    <row>
        <columns>
            <button class="expand" href="<%= @dashboard_url %>">Open dashboard</button>
        </columns>
    </row>
    <h-line></h-line>
    <center>
        <menu>
            <item href="<%= @settings_url %>">Settings</item>
            <item href="<%= @unsubscribe_url %>">Unsubscribe</item>
        </menu>
    </center>
</container>
"##
}

/// Minimal template for unit testing.
pub fn minimal_template() -> &'static str {
    r#"<p>Hello <%= @name %></p>"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::grid::expand_grid;
    use crate::layout::CONTENT_PLACEHOLDER;
    use crate::shield::shield;

    fn all() -> Vec<(&'static str, &'static str)> {
        vec![
            ("layout", layout_template()),
            ("welcome", welcome_template()),
            ("receipt", receipt_template()),
            ("foundation", foundation_template()),
            ("minimal", minimal_template()),
        ]
    }

    #[test]
    fn templates_parse_once_shielded() {
        for (name, html) in all() {
            let doc = parse_html(&shield(html));
            assert!(!doc.children.is_empty(), "template '{name}' is empty");
        }
    }

    #[test]
    fn layout_has_a_content_slot() {
        assert_eq!(layout_template().matches(CONTENT_PLACEHOLDER).count(), 1);
    }

    #[test]
    fn foundation_template_expands() {
        let mut doc = parse_html(&shield(foundation_template()));
        expand_grid(&mut doc).unwrap();
        let html = doc.to_html();
        assert!(!html.contains("<columns"));
        assert!(html.contains("small-12 large-6 columns first"));
        assert!(html.contains("class=\"menu-item float-center\""));
    }
}
