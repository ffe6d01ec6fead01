// Trellis
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! HTTP message types, response builders and the status code table

pub mod exception;
pub mod request;
pub mod response;
pub mod status;

use http_body_util::Full;
use hyper::body::Bytes;

pub use exception::HttpException;
pub use request::{ParsedBody, RequestInfo, RouteParams, cookie_value, input, parsed_body, query_params};
pub use response::{EmptyResponse, HtmlResponse, IntoResponse, JsonResponse, RedirectResponse, XmlResponse};

/// Request with a fully buffered body
pub type Request = hyper::Request<Bytes>;

/// Response type produced by handlers, middleware and the kernels
pub type Response = hyper::Response<Full<Bytes>>;
