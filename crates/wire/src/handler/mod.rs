//! The router and request handler seen by a connection.
//!
//! A [`Handler`] answers twice per request: [`Handler::route`] once the head is parsed, to
//! decide limits and how the body is acquired, then [`Handler::call`] with the complete
//! request. [`make_handler`] turns an async function into a handler with the default route.

use std::error::Error;

use async_trait::async_trait;
use http::{Request, Response};
use http_body::Body;

use crate::connection::{RequestBody, Route};
use crate::protocol::RequestFrame;

#[async_trait]
pub trait Handler: Send + Sync {
    type RespBody: Body;
    type Error: Into<Box<dyn Error + Send + Sync>>;

    /// Decides how the request with this head is served.
    fn route(&self, _frame: &RequestFrame) -> Route {
        Route::default()
    }

    async fn call(&self, req: Request<RequestBody>) -> Result<Response<Self::RespBody>, Self::Error>;
}

pub type RouteFn = fn(&RequestFrame) -> Route;

#[derive(Debug)]
pub struct HandlerFn<F, R = RouteFn> {
    f: F,
    router: R,
}

impl<F> HandlerFn<F> {
    /// Routes every request with `router` instead of the default route.
    pub fn with_route<R>(self, router: R) -> HandlerFn<F, R>
    where
        R: Fn(&RequestFrame) -> Route + Send + Sync,
    {
        HandlerFn { f: self.f, router }
    }
}

#[async_trait]
impl<RespBody, Err, F, Fut, R> Handler for HandlerFn<F, R>
where
    RespBody: Body,
    F: Fn(Request<RequestBody>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
    R: Fn(&RequestFrame) -> Route + Send + Sync,
{
    type RespBody = RespBody;
    type Error = Err;

    fn route(&self, frame: &RequestFrame) -> Route {
        (self.router)(frame)
    }

    async fn call(&self, req: Request<RequestBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        (self.f)(req).await
    }
}

pub fn make_handler<F, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<RequestBody>) -> Ret,
{
    HandlerFn { f, router: default_route }
}

fn default_route(_frame: &RequestFrame) -> Route {
    Route::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::head::RequestHeadDecoder;
    use bytes::BytesMut;
    use tokio_util::codec::Decoder;

    async fn hello(_req: Request<RequestBody>) -> Result<Response<String>, Box<dyn Error + Send + Sync>> {
        Ok(Response::new("hello".to_string()))
    }

    fn frame(raw: &str) -> RequestFrame {
        RequestHeadDecoder::new().decode(&mut BytesMut::from(raw)).unwrap().unwrap().0
    }

    #[tokio::test]
    async fn function_handler() {
        let handler = make_handler(hello);
        let route = handler.route(&frame("GET / HTTP/1.1\r\n\r\n"));
        assert!(!route.websocket);

        let response = handler.call(Request::new(RequestBody::Empty)).await.unwrap();
        assert_eq!(response.body(), "hello");
    }

    #[tokio::test]
    async fn custom_router() {
        let handler = make_handler(hello).with_route(|frame: &RequestFrame| {
            Route::new().with_websocket(frame.path() == "/ws").with_compression(true)
        });
        assert!(handler.route(&frame("GET /ws HTTP/1.1\r\n\r\n")).websocket);
        assert!(!handler.route(&frame("GET /other HTTP/1.1\r\n\r\n")).websocket);
    }
}
