// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::net::IpAddr;
use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;
use axum::http::Request;

const FORWARDED_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// The address of the client that sent `request`.
///
/// Proxy headers are consulted first (`X-Forwarded-For`, then `X-Real-IP`, then
/// `CF-Connecting-IP`); only the first entry of `X-Forwarded-For` is considered and it must be a
/// valid address. The peer address recorded by
/// [`into_make_service_with_connect_info`](axum::Router::into_make_service_with_connect_info)
/// comes next. Otherwise, `unknown`.
pub fn client_ip<B>(request: &Request<B>) -> String {
    if let Some(ip) = forwarded_ip(request.headers()) {
        return ip.to_string();
    }

    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    FORWARDED_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        let first = value.split(',').next()?.trim();
        first.parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let req = request(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1"),
            ("x-real-ip", "198.51.100.1"),
        ]);
        assert_eq!(client_ip(&req), "203.0.113.7");
    }

    #[test]
    fn test_invalid_forwarded_for_falls_through() {
        let req = request(&[
            ("x-forwarded-for", "garbage"),
            ("cf-connecting-ip", "2001:db8::1"),
        ]);
        assert_eq!(client_ip(&req), "2001:db8::1");
    }

    #[test]
    fn test_connect_info_and_unknown() {
        let mut req = request(&[]);
        assert_eq!(client_ip(&req), "unknown");

        let addr: SocketAddr = "192.0.2.10:51234".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_ip(&req), "192.0.2.10");
    }
}
